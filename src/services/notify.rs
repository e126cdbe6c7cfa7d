//! Bulk absence notification.
//!
//! DESIGN
//! ======
//! Alerts go out one at a time with a fixed pause between attempts so the
//! mail provider's rate limits are not tripped. A failed send is recorded in
//! the report and the batch moves on; dispatch as a whole never fails.

use std::time::Duration;

use serde::Serialize;
use time::Date;
use tracing::{info, warn};

use super::absence::AbsentStudent;
use crate::mail::{AbsenceAlert, Mailer, Notification};

pub const DEFAULT_PARENT_NAME: &str = "Parent";

/// Alerts ready to send plus the number of absent students with no contact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertBatch {
    pub alerts: Vec<AbsenceAlert>,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Absent students without a parent email.
    pub skipped: usize,
    /// `"<student name>: <reason>"`, capped at the configured maximum.
    pub errors: Vec<String>,
}

/// Build one alert per absent student that has a parent contact.
#[must_use]
pub fn alerts_for(absent: &[AbsentStudent], date: Date) -> AlertBatch {
    let mut batch = AlertBatch::default();
    for student in absent {
        let Some(parent_email) = student.parent_email.as_deref().filter(|e| !e.trim().is_empty()) else {
            batch.skipped += 1;
            continue;
        };
        batch.alerts.push(AbsenceAlert {
            parent_email: parent_email.to_owned(),
            parent_name: DEFAULT_PARENT_NAME.to_owned(),
            student_name: student.name.clone(),
            reg_no: student.reg_no.clone(),
            attendance_date: date,
        });
    }
    batch
}

/// Send every alert sequentially, waiting `delay` between attempts.
pub async fn dispatch_alerts(
    mailer: &dyn Mailer,
    alerts: &[AbsenceAlert],
    delay: Duration,
    max_errors: usize,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (i, alert) in alerts.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match mailer.send(&Notification::AbsenceAlert(alert.clone())).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!(reg_no = %alert.reg_no, error = %e, "absence alert failed");
                report.failed += 1;
                if report.errors.len() < max_errors {
                    report.errors.push(format!("{}: {e}", alert.student_name));
                }
            }
        }
    }

    info!(sent = report.sent, failed = report.failed, "absence alerts dispatched");
    report
}

/// Build alerts for `absent` and dispatch them.
pub async fn notify_absent(
    mailer: &dyn Mailer,
    absent: &[AbsentStudent],
    date: Date,
    delay: Duration,
    max_errors: usize,
) -> DispatchReport {
    let batch = alerts_for(absent, date);
    let mut report = dispatch_alerts(mailer, &batch.alerts, delay, max_errors).await;
    report.skipped = batch.skipped;
    report
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
