use super::*;
use crate::mail::types::AbsenceAlert;
use crate::store::RegNo;
use time::macros::date;

fn settings() -> EmailJsSettings {
    EmailJsSettings {
        service_id: "service_1".into(),
        absence_template_id: "template_absent".into(),
        reset_template_id: "template_otp".into(),
        public_key: "pk_live".into(),
        private_key: None,
        base_url: "https://api.emailjs.com".into(),
    }
}

fn alert() -> Notification {
    Notification::AbsenceAlert(AbsenceAlert {
        parent_email: "mum@example.com".into(),
        parent_name: "Parent/Guardian".into(),
        student_name: "Ada Obi".into(),
        reg_no: RegNo::parse("csc-001").unwrap(),
        attendance_date: date!(2026 - 10 - 16),
    })
}

#[test]
fn absence_alert_uses_absence_template_and_params() {
    let s = settings();
    let body = serde_json::to_value(build_request(&s, &alert())).unwrap();
    assert_eq!(body["service_id"], "service_1");
    assert_eq!(body["template_id"], "template_absent");
    assert_eq!(body["user_id"], "pk_live");
    assert!(body.get("accessToken").is_none());

    let params = &body["template_params"];
    assert_eq!(params["to_email"], "mum@example.com");
    assert_eq!(params["student_name"], "Ada Obi");
    assert_eq!(params["registration_number"], "CSC-001");
    assert_eq!(params["attendance_date"], "October 16, 2026");
}

#[test]
fn reset_code_uses_reset_template_and_private_key() {
    let s = EmailJsSettings { private_key: Some("sk_secret".into()), ..settings() };
    let n = Notification::ResetCode { email: "office@campus.edu".into(), code: "482913".into(), expiry_minutes: 5 };
    let body = serde_json::to_value(build_request(&s, &n)).unwrap();
    assert_eq!(body["template_id"], "template_otp");
    assert_eq!(body["accessToken"], "sk_secret");
    assert_eq!(body["template_params"]["otp_code"], "482913");
    assert_eq!(body["template_params"]["expiry_time"], "5 minutes");
    assert_eq!(body["template_params"]["to_email"], "office@campus.edu");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_request_error() {
    let s = EmailJsSettings { base_url: "http://127.0.0.1:9".into(), ..settings() };
    let client = EmailJsClient::new(s, 2).unwrap();
    assert!(matches!(client.send(&alert()).await, Err(MailError::Request(_))));
}
