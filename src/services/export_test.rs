use super::*;
use crate::services::absence::{compute_absent, dashboard_stats};
use crate::state::test_helpers::{record_at, student, t0};
use time::Duration;
use time::macros::date;

const DAY: Date = date!(2026 - 10 - 16);

#[test]
fn empty_report_is_no_data() {
    assert_eq!(render_report_csv(&[]), Err(ExportError::NoData));
    assert_eq!(render_report_csv(&report_rows(&[], &[], DAY)), Err(ExportError::NoData));
}

#[test]
fn report_lists_present_then_absent() {
    let students = vec![student("A1", "Ann", t0()), student("B2", "Bea", t0() + Duration::seconds(1))];
    let present = vec![record_at("B2", DAY, t0())];
    let absent = compute_absent(&students, &present);

    let rows = report_rows(&present, &absent, DAY);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, ReportStatus::Present);
    assert_eq!(rows[1].reg_no.as_str(), "A1");

    let csv = render_report_csv(&rows).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").collect();
    assert_eq!(lines[0], "Name,Registration Number,Status,Time,Date");
    assert_eq!(lines[1], "Student B2,B2,Present,09:00:00,2026-10-16");
    assert_eq!(lines[2], "Ann,A1,Absent,N/A,2026-10-16");
    assert_eq!(lines[3], "");
}

#[test]
fn fields_are_quoted_when_needed() {
    let rows = vec![ReportRow {
        name: "Obi, \"Ada\"".into(),
        reg_no: RegNo::parse("A1").unwrap(),
        status: ReportStatus::Absent,
        time: None,
        date: DAY,
    }];
    let csv = render_report_csv(&rows).unwrap();
    assert!(csv.contains("\"Obi, \"\"Ada\"\"\",A1,Absent,N/A,2026-10-16\r\n"));
}

#[test]
fn formula_like_fields_are_neutralized() {
    let row = |name: &str| ReportRow {
        name: name.into(),
        reg_no: RegNo::parse("A1").unwrap(),
        status: ReportStatus::Absent,
        time: None,
        date: DAY,
    };
    let rows = vec![row("=HYPERLINK(\"http://x\",\"y\")"), row("+1"), row("-2"), row("@SUM(A1)"), row("Ann-Marie")];
    let csv = render_report_csv(&rows).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").collect();
    assert_eq!(lines[1], "\"'=HYPERLINK(\"\"http://x\"\",\"\"y\"\")\",A1,Absent,N/A,2026-10-16");
    assert_eq!(lines[2], "'+1,A1,Absent,N/A,2026-10-16");
    assert_eq!(lines[3], "'-2,A1,Absent,N/A,2026-10-16");
    assert_eq!(lines[4], "'@SUM(A1),A1,Absent,N/A,2026-10-16");
    assert_eq!(lines[5], "Ann-Marie,A1,Absent,N/A,2026-10-16");
}

#[test]
fn summary_has_stats_and_absent_list() {
    let students = vec![student("A1", "Ann", t0()), student("B2", "Bea", t0() + Duration::seconds(1))];
    let present = vec![record_at("A1", DAY, t0())];
    let stats = dashboard_stats(&students, &present);
    let absent = compute_absent(&students, &present);

    let csv = render_summary_csv(&stats, &absent, t0());
    assert!(csv.starts_with("ATTENDANCE REPORT SUMMARY\r\n\r\n"));
    assert!(csv.contains("Total Registered Students,2\r\n"));
    assert!(csv.contains("Present Today,1\r\n"));
    assert!(csv.contains("Absent Today,1\r\n"));
    assert!(csv.contains("Attendance Percentage,50.0%\r\n"));
    assert!(csv.contains("Report Generated,2026-10-16 09:00:00\r\n"));
    assert!(csv.ends_with("Name,Registration Number,Status\r\nBea,B2,ABSENT\r\n"));
}

#[test]
fn summary_without_absentees_omits_list() {
    let stats = dashboard_stats(&[], &[]);
    let csv = render_summary_csv(&stats, &[], t0());
    assert!(!csv.contains("ABSENT"));
    assert!(csv.contains("Attendance Percentage,0.0%"));
}

#[test]
fn file_names_carry_the_date() {
    assert_eq!(report_file_name(DAY), "Attendance_Report_2026-10-16.csv");
    assert_eq!(summary_file_name(DAY), "Attendance_Summary_2026-10-16.csv");
}
