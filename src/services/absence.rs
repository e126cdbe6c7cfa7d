//! Absence computation and dashboard statistics.
//!
//! Present/absent is derived, never stored: a registered student is present
//! on a date iff an attendance record exists under their registration
//! number for that date. Everything here is pure over slices.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use time::Date;

use crate::store::{AttendanceRecord, RegNo, Student};

/// A registered student with no record for the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsentStudent {
    pub reg_no: RegNo,
    pub name: String,
    pub email: Option<String>,
    pub parent_email: Option<String>,
}

impl From<&Student> for AbsentStudent {
    fn from(s: &Student) -> Self {
        Self { reg_no: s.reg_no.clone(), name: s.name.clone(), email: s.email.clone(), parent_email: s.parent_email.clone() }
    }
}

/// `students \ present`, keyed by registration number, in roster order.
#[must_use]
pub fn compute_absent(students: &[Student], present: &[AttendanceRecord]) -> Vec<AbsentStudent> {
    let present: HashSet<&RegNo> = present.iter().map(|r| &r.reg_no).collect();
    students
        .iter()
        .filter(|s| !present.contains(&s.reg_no))
        .map(AbsentStudent::from)
        .collect()
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_registered: usize,
    pub present_today: usize,
    pub absent_today: usize,
    /// One decimal place, `"0.0"` with an empty roster.
    pub attendance_percentage: String,
}

/// Headline numbers for one day. Records from unregistered numbers are
/// ignored.
#[must_use]
pub fn dashboard_stats(students: &[Student], present: &[AttendanceRecord]) -> DashboardStats {
    let present_keys: HashSet<&RegNo> = present.iter().map(|r| &r.reg_no).collect();
    let total_registered = students.len();
    let present_today = students.iter().filter(|s| present_keys.contains(&s.reg_no)).count();
    DashboardStats {
        total_registered,
        present_today,
        absent_today: total_registered - present_today,
        attendance_percentage: format_percentage(present_today, total_registered),
    }
}

/// `part / whole` as a percentage with one decimal.
#[must_use]
pub fn format_percentage(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.0".to_owned();
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = part as f64 * 100.0 / whole as f64;
    format!("{pct:.1}")
}

// =============================================================================
// ANALYTICS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStatistics {
    pub date: Date,
    pub present_count: usize,
    pub absent_count: usize,
    pub total_students: usize,
    pub attendance_percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentAnalytics {
    pub reg_no: RegNo,
    pub name: String,
    pub total_days_present: usize,
    pub total_days_absent: usize,
    /// One decimal place followed by `%`.
    pub attendance_rate: String,
}

/// Per-date counts for every date that has at least one record, oldest
/// first, measured against the current roster. Records from unregistered
/// numbers keep their date in the list but are not counted as present.
#[must_use]
pub fn daily_statistics(students: &[Student], records: &[AttendanceRecord]) -> Vec<DailyStatistics> {
    let registered: HashSet<&RegNo> = students.iter().map(|s| &s.reg_no).collect();
    let registered_count = registered.len();
    let mut per_day: BTreeMap<Date, usize> = BTreeMap::new();
    for record in records {
        let present = per_day.entry(record.date).or_default();
        if registered.contains(&record.reg_no) {
            *present += 1;
        }
    }
    per_day
        .into_iter()
        .map(|(date, present)| {
            let present_count = present.min(registered_count);
            DailyStatistics {
                date,
                present_count,
                absent_count: registered_count - present_count,
                total_students: registered_count,
                attendance_percentage: format_percentage(present_count, registered_count),
            }
        })
        .collect()
}

/// Attendance rate per student over `days` school days, in roster order.
#[must_use]
pub fn student_attendance_rates(students: &[Student], records: &[AttendanceRecord], days: usize) -> Vec<StudentAnalytics> {
    let mut present: BTreeMap<&RegNo, usize> = BTreeMap::new();
    for record in records {
        *present.entry(&record.reg_no).or_default() += 1;
    }
    students
        .iter()
        .map(|s| {
            let total_days_present = present.get(&s.reg_no).copied().unwrap_or(0).min(days);
            StudentAnalytics {
                reg_no: s.reg_no.clone(),
                name: s.name.clone(),
                total_days_present,
                total_days_absent: days - total_days_present,
                attendance_rate: format!("{}%", format_percentage(total_days_present, days)),
            }
        })
        .collect()
}

/// Number of distinct dates with at least one record.
#[must_use]
pub fn distinct_days(records: &[AttendanceRecord]) -> usize {
    records.iter().map(|r| r.date).collect::<HashSet<_>>().len()
}

#[cfg(test)]
#[path = "absence_test.rs"]
mod tests;
