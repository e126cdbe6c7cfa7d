use super::*;

const KEYS: &[&str] = &[
    "MAIL_PROVIDER",
    "EMAILJS_SERVICE_ID",
    "EMAILJS_ABSENCE_TEMPLATE_ID",
    "EMAILJS_RESET_TEMPLATE_ID",
    "EMAILJS_PUBLIC_KEY",
    "EMAILJS_PRIVATE_KEY",
    "EMAILJS_BASE_URL",
    "RESEND_API_KEY",
    "RESEND_FROM",
];

#[test]
fn parse_provider_defaults_to_emailjs() {
    assert_eq!(parse_provider(None).unwrap(), ProviderKind::EmailJs);
    assert_eq!(parse_provider(Some(" resend ")).unwrap(), ProviderKind::Resend);
    assert!(matches!(parse_provider(Some("smtp")), Err(MailError::ConfigParse(_))));
}

// Only this test mutates the MAIL_/EMAILJS_/RESEND_ keys.
#[test]
fn from_env_cases() {
    for key in KEYS {
        unsafe { std::env::remove_var(key) };
    }
    assert!(matches!(MailConfig::from_env(), Err(MailError::MissingVar { var: "EMAILJS_SERVICE_ID" })));

    unsafe {
        std::env::set_var("EMAILJS_SERVICE_ID", "service_1");
        std::env::set_var("EMAILJS_ABSENCE_TEMPLATE_ID", "template_absent");
        std::env::set_var("EMAILJS_RESET_TEMPLATE_ID", "template_otp");
        std::env::set_var("EMAILJS_PUBLIC_KEY", "pk");
        std::env::set_var("EMAILJS_BASE_URL", "http://localhost:9000/");
    }
    let cfg = MailConfig::from_env().unwrap();
    let MailProvider::EmailJs(settings) = cfg.provider else {
        panic!("expected EmailJS provider");
    };
    assert_eq!(settings.base_url, "http://localhost:9000");
    assert_eq!(settings.private_key, None);
    assert_eq!(cfg.request_timeout_secs, DEFAULT_MAIL_REQUEST_TIMEOUT_SECS);

    unsafe { std::env::set_var("MAIL_PROVIDER", "resend") };
    assert!(matches!(MailConfig::from_env(), Err(MailError::MissingVar { var: "RESEND_API_KEY" })));

    unsafe {
        std::env::set_var("RESEND_API_KEY", "re_test");
        std::env::set_var("RESEND_FROM", "Attendance <noreply@campus.edu>");
    }
    let cfg = MailConfig::from_env().unwrap();
    assert_eq!(
        cfg.provider,
        MailProvider::Resend(ResendSettings {
            api_key: "re_test".into(),
            from: "Attendance <noreply@campus.edu>".into()
        })
    );

    for key in KEYS {
        unsafe { std::env::remove_var(key) };
    }
}
