use super::*;
use crate::state::test_helpers::MockMailer;
use crate::store::RegNo;
use time::macros::date;

const DAY: Date = date!(2026 - 10 - 16);

fn absent(reg_no: &str, parent_email: Option<&str>) -> AbsentStudent {
    AbsentStudent {
        reg_no: RegNo::parse(reg_no).unwrap(),
        name: format!("Student {reg_no}"),
        email: None,
        parent_email: parent_email.map(str::to_owned),
    }
}

fn alerts(n: usize) -> Vec<AbsenceAlert> {
    let students: Vec<_> = (0..n)
        .map(|i| absent(&format!("S{i}"), Some(&format!("p{i}@example.com"))))
        .collect();
    alerts_for(&students, DAY).alerts
}

#[test]
fn alerts_skip_students_without_contact() {
    let batch = alerts_for(&[absent("A1", Some("mum@example.com")), absent("B2", None), absent("C3", Some(" "))], DAY);
    assert_eq!(batch.skipped, 2);
    assert_eq!(batch.alerts.len(), 1);
    let alert = &batch.alerts[0];
    assert_eq!(alert.parent_email, "mum@example.com");
    assert_eq!(alert.parent_name, DEFAULT_PARENT_NAME);
    assert_eq!(alert.attendance_date, DAY);
}

#[tokio::test]
async fn all_succeed() {
    let mailer = MockMailer::default();
    let report = dispatch_alerts(&mailer, &alerts(3), Duration::ZERO, 50).await;
    assert_eq!(report, DispatchReport { sent: 3, failed: 0, skipped: 0, errors: vec![] });
    assert_eq!(mailer.sent().len(), 3);
}

#[tokio::test]
async fn failures_are_counted_and_batch_continues() {
    let mailer = MockMailer::failing_for(&["p1@example.com", "p3@example.com"]);
    let report = dispatch_alerts(&mailer, &alerts(5), Duration::ZERO, 50).await;
    assert_eq!(report.sent, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("Student S1: "));
    assert!(report.errors[1].starts_with("Student S3: "));
}

#[tokio::test]
async fn error_messages_are_capped() {
    let mailer = MockMailer::failing_for(&["p0@example.com", "p1@example.com", "p2@example.com"]);
    let report = dispatch_alerts(&mailer, &alerts(3), Duration::ZERO, 2).await;
    assert_eq!(report.failed, 3);
    assert_eq!(report.errors.len(), 2);
}

#[tokio::test]
async fn empty_batch_sends_nothing() {
    let mailer = MockMailer::default();
    let report = dispatch_alerts(&mailer, &[], Duration::from_millis(100), 50).await;
    assert_eq!(report, DispatchReport::default());
}

#[tokio::test(start_paused = true)]
async fn delay_applies_between_attempts() {
    let mailer = MockMailer::default();
    let started = tokio::time::Instant::now();
    dispatch_alerts(&mailer, &alerts(3), Duration::from_millis(100), 50).await;
    assert_eq!(started.elapsed(), Duration::from_millis(200));
}

#[tokio::test]
async fn notify_absent_reports_skipped() {
    let mailer = MockMailer::default();
    let report = notify_absent(&mailer, &[absent("A1", Some("a@x.io")), absent("B2", None)], DAY, Duration::ZERO, 50).await;
    assert_eq!((report.sent, report.failed, report.skipped), (1, 0, 1));
}
