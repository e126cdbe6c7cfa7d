use super::*;
use crate::store::RegNo;
use time::macros::date;

fn alert(name: &str) -> AbsenceAlert {
    AbsenceAlert {
        parent_email: "dad@example.com".into(),
        parent_name: "Parent/Guardian".into(),
        student_name: name.into(),
        reg_no: RegNo::parse("eng-42").unwrap(),
        attendance_date: date!(2026 - 10 - 16),
    }
}

#[test]
fn absence_template_injects_fields() {
    let html = render_absence_alert(&alert("Tunde Bello"));
    assert!(html.contains("Tunde Bello"));
    assert!(html.contains("ENG-42"));
    assert!(html.contains("October 16, 2026"));
    assert!(!html.contains("{{"));
}

#[test]
fn absence_template_escapes_markup() {
    let html = render_absence_alert(&alert("<b>Eve</b> & co"));
    assert!(html.contains("&lt;b&gt;Eve&lt;/b&gt; &amp; co"));
    assert!(!html.contains("<b>Eve</b>"));
}

#[test]
fn placeholders_inside_values_are_not_expanded() {
    let mut alert = alert("{{REG_NO}} {{DATE}}");
    alert.parent_name = "{{STUDENT_NAME}}".into();
    let html = render_absence_alert(&alert);
    assert!(html.contains("{{REG_NO}} {{DATE}}"));
    assert!(html.contains("{{STUDENT_NAME}}"));
    assert_eq!(html.matches("ENG-42").count(), ABSENCE_ALERT_TEMPLATE.matches("{{REG_NO}}").count());
}

#[test]
fn fill_template_keeps_unknown_and_unterminated_markers() {
    let values = [("A", "x".to_owned())];
    assert_eq!(fill_template("{{A}}-{{B}}-{{A", &values), "x-{{B}}-{{A");
    assert_eq!(fill_template("no markers", &values), "no markers");
}

#[test]
fn reset_template_injects_code_and_expiry() {
    let (subject, html) =
        render(&Notification::ResetCode { email: "office@campus.edu".into(), code: "731045".into(), expiry_minutes: 5 });
    assert_eq!(subject, "Your password reset code");
    assert!(html.contains("731045"));
    assert!(html.contains("5 minutes"));
    assert!(!html.contains("{{"));
}
