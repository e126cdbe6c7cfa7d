//! Mail configuration parsed from environment variables.

use super::types::MailError;
use crate::config::{env_parse, env_string};

pub const DEFAULT_EMAILJS_BASE_URL: &str = "https://api.emailjs.com";
pub const DEFAULT_MAIL_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailJsSettings {
    pub service_id: String,
    pub absence_template_id: String,
    pub reset_template_id: String,
    /// Sent as `user_id`.
    pub public_key: String,
    /// Sent as `accessToken` when present.
    pub private_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendSettings {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailProvider {
    EmailJs(EmailJsSettings),
    Resend(ResendSettings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub provider: MailProvider,
    pub request_timeout_secs: u64,
}

impl MailConfig {
    /// Build typed mail config from environment variables.
    ///
    /// - `MAIL_PROVIDER`: `emailjs` (default) or `resend`
    /// - EmailJS: `EMAILJS_SERVICE_ID`, `EMAILJS_ABSENCE_TEMPLATE_ID`,
    ///   `EMAILJS_RESET_TEMPLATE_ID`, `EMAILJS_PUBLIC_KEY` (required),
    ///   `EMAILJS_PRIVATE_KEY`, `EMAILJS_BASE_URL` (optional)
    /// - Resend: `RESEND_API_KEY`, `RESEND_FROM` (required)
    /// - `MAIL_REQUEST_TIMEOUT_SECS`: default 15
    ///
    /// # Errors
    ///
    /// Returns [`MailError::MissingVar`] for the first required variable that
    /// is unset, or [`MailError::ConfigParse`] for an unknown provider.
    pub fn from_env() -> Result<Self, MailError> {
        let provider = match parse_provider(std::env::var("MAIL_PROVIDER").ok().as_deref())? {
            ProviderKind::EmailJs => MailProvider::EmailJs(EmailJsSettings {
                service_id: required("EMAILJS_SERVICE_ID")?,
                absence_template_id: required("EMAILJS_ABSENCE_TEMPLATE_ID")?,
                reset_template_id: required("EMAILJS_RESET_TEMPLATE_ID")?,
                public_key: required("EMAILJS_PUBLIC_KEY")?,
                private_key: env_string("EMAILJS_PRIVATE_KEY"),
                base_url: env_string("EMAILJS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_EMAILJS_BASE_URL.to_owned())
                    .trim_end_matches('/')
                    .to_owned(),
            }),
            ProviderKind::Resend => MailProvider::Resend(ResendSettings {
                api_key: required("RESEND_API_KEY")?,
                from: required("RESEND_FROM")?,
            }),
        };

        Ok(Self {
            provider,
            request_timeout_secs: env_parse("MAIL_REQUEST_TIMEOUT_SECS", DEFAULT_MAIL_REQUEST_TIMEOUT_SECS),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProviderKind {
    EmailJs,
    Resend,
}

fn parse_provider(raw: Option<&str>) -> Result<ProviderKind, MailError> {
    match raw.map(str::trim).unwrap_or("emailjs") {
        "emailjs" => Ok(ProviderKind::EmailJs),
        "resend" => Ok(ProviderKind::Resend),
        other => Err(MailError::ConfigParse(format!("unknown MAIL_PROVIDER: {other}"))),
    }
}

fn required(var: &'static str) -> Result<String, MailError> {
    env_string(var).ok_or(MailError::MissingVar { var })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
