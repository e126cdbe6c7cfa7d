//! CSV report export.
//!
//! Two downloads: the per-student report (present rows then absent rows for
//! one date) and the summary (headline numbers followed by the absent list).
//! Fields are quoted per RFC 4180 only when they need it. An empty report is
//! an error rather than a header-only file.

use serde::Serialize;
use time::{Date, OffsetDateTime};

use super::absence::{AbsentStudent, DashboardStats};
use crate::store::{AttendanceRecord, RegNo};

const REPORT_HEADER: [&str; 5] = ["Name", "Registration Number", "Status", "Time", "Date"];
const ABSENT_HEADER: [&str; 3] = ["Name", "Registration Number", "Status"];
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("No attendance data to export")]
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStatus {
    Present,
    Absent,
}

impl ReportStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub reg_no: RegNo,
    pub status: ReportStatus,
    pub time: Option<String>,
    pub date: Date,
}

/// Present rows in the given order, then absent rows in roster order.
#[must_use]
pub fn report_rows(present: &[AttendanceRecord], absent: &[AbsentStudent], date: Date) -> Vec<ReportRow> {
    let present_rows = present.iter().map(|r| ReportRow {
        name: r.name.clone(),
        reg_no: r.reg_no.clone(),
        status: ReportStatus::Present,
        time: Some(r.time.clone()),
        date: r.date,
    });
    let absent_rows = absent.iter().map(|a| ReportRow {
        name: a.name.clone(),
        reg_no: a.reg_no.clone(),
        status: ReportStatus::Absent,
        time: None,
        date,
    });
    present_rows.chain(absent_rows).collect()
}

/// # Errors
///
/// [`ExportError::NoData`] when `rows` is empty.
pub fn render_report_csv(rows: &[ReportRow]) -> Result<String, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoData);
    }
    let mut out = String::new();
    push_record(&mut out, &REPORT_HEADER);
    for row in rows {
        let date = row.date.to_string();
        push_record(
            &mut out,
            &[
                row.name.as_str(),
                row.reg_no.as_str(),
                row.status.as_str(),
                row.time.as_deref().unwrap_or(NOT_AVAILABLE),
                date.as_str(),
            ],
        );
    }
    Ok(out)
}

#[must_use]
pub fn render_summary_csv(stats: &DashboardStats, absent: &[AbsentStudent], generated_at: OffsetDateTime) -> String {
    let mut out = String::new();
    push_record(&mut out, &["ATTENDANCE REPORT SUMMARY"]);
    out.push_str("\r\n");
    push_record(&mut out, &["Total Registered Students", stats.total_registered.to_string().as_str()]);
    push_record(&mut out, &["Present Today", stats.present_today.to_string().as_str()]);
    push_record(&mut out, &["Absent Today", stats.absent_today.to_string().as_str()]);
    push_record(&mut out, &["Attendance Percentage", format!("{}%", stats.attendance_percentage).as_str()]);
    push_record(&mut out, &["Report Generated", format_timestamp(generated_at).as_str()]);

    if !absent.is_empty() {
        out.push_str("\r\n");
        push_record(&mut out, &ABSENT_HEADER);
        for student in absent {
            push_record(&mut out, &[student.name.as_str(), student.reg_no.as_str(), "ABSENT"]);
        }
    }
    out
}

#[must_use]
pub fn report_file_name(date: Date) -> String {
    format!("Attendance_Report_{date}.csv")
}

#[must_use]
pub fn summary_file_name(date: Date) -> String {
    format!("Attendance_Summary_{date}.csv")
}

fn format_timestamp(at: OffsetDateTime) -> String {
    format!("{} {:02}:{:02}:{:02}", at.date(), at.hour(), at.minute(), at.second())
}

fn push_record(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

/// Leading characters that make spreadsheets treat a cell as a formula.
const FORMULA_TRIGGERS: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

fn push_field(out: &mut String, field: &str) {
    let guarded;
    let field = if field.starts_with(FORMULA_TRIGGERS) {
        guarded = format!("'{field}");
        guarded.as_str()
    } else {
        field
    };
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
