//! EmailJS REST client.
//!
//! Thin HTTP wrapper for `/api/v1.0/email/send`. Each notification kind maps
//! to a dashboard-side template; `build_request` is pure for testability.
//! EmailJS answers `200 OK` with a plain-text body on success and anything
//! else is treated as a rejection.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use super::config::EmailJsSettings;
use super::types::{MailError, Notification, display_date};

const SEND_PATH: &str = "/api/v1.0/email/send";
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLIENT
// =============================================================================

pub struct EmailJsClient {
    http: reqwest::Client,
    settings: EmailJsSettings,
}

impl EmailJsClient {
    /// # Errors
    ///
    /// Returns [`MailError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(settings: EmailJsSettings, request_timeout_secs: u64) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| MailError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, settings })
    }

    /// # Errors
    ///
    /// Returns [`MailError::Request`] on transport failure and
    /// [`MailError::Rejected`] on any non-200 answer.
    pub async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        let body = build_request(&self.settings, notification);
        let url = format!("{}{SEND_PATH}", self.settings.base_url);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body: text });
        }
        Ok(())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: Value,
}

pub(crate) fn build_request<'a>(settings: &'a EmailJsSettings, notification: &Notification) -> SendRequest<'a> {
    let (template_id, template_params) = match notification {
        Notification::AbsenceAlert(alert) => (
            settings.absence_template_id.as_str(),
            json!({
                "to_email": alert.parent_email,
                "parent_name": alert.parent_name,
                "student_name": alert.student_name,
                "registration_number": alert.reg_no.as_str(),
                "attendance_date": display_date(alert.attendance_date),
            }),
        ),
        Notification::ResetCode { email, code, expiry_minutes } => (
            settings.reset_template_id.as_str(),
            json!({
                "to_email": email,
                "staff_email": email,
                "otp_code": code,
                "expiry_time": format!("{expiry_minutes} minutes"),
            }),
        ),
    };

    SendRequest {
        service_id: &settings.service_id,
        template_id,
        user_id: &settings.public_key,
        access_token: settings.private_key.as_deref(),
        template_params,
    }
}

#[cfg(test)]
#[path = "emailjs_test.rs"]
mod tests;
