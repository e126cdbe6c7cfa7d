//! Resend delivery with locally rendered HTML templates.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use super::config::ResendSettings;
use super::types::{AbsenceAlert, MailError, Notification, display_date};

const ABSENCE_ALERT_TEMPLATE: &str = include_str!("../../templates/absence_alert.html");
const RESET_CODE_TEMPLATE: &str = include_str!("../../templates/reset_code.html");

pub struct ResendClient {
    resend: Resend,
    from: String,
}

impl ResendClient {
    #[must_use]
    pub fn new(settings: ResendSettings) -> Self {
        Self { resend: Resend::new(&settings.api_key), from: settings.from }
    }

    /// # Errors
    ///
    /// Returns [`MailError::Request`] when Resend refuses or cannot be reached.
    pub async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        let (subject, html) = render(notification);
        let to = [notification.recipient()];
        let email = CreateEmailBaseOptions::new(&self.from, to, subject).with_html(&html);
        self.resend
            .emails
            .send(email)
            .await
            .map_err(|e| MailError::Request(e.to_string()))?;
        Ok(())
    }
}

/// Subject line and HTML body for a notification.
#[must_use]
pub fn render(notification: &Notification) -> (String, String) {
    match notification {
        Notification::AbsenceAlert(alert) => {
            (format!("Attendance alert: {}", alert.student_name), render_absence_alert(alert))
        }
        Notification::ResetCode { code, expiry_minutes, .. } => {
            ("Your password reset code".to_owned(), render_reset_code(code, *expiry_minutes))
        }
    }
}

#[must_use]
pub fn render_absence_alert(alert: &AbsenceAlert) -> String {
    fill_template(
        ABSENCE_ALERT_TEMPLATE,
        &[
            ("PARENT_NAME", escape_html(&alert.parent_name)),
            ("STUDENT_NAME", escape_html(&alert.student_name)),
            ("REG_NO", escape_html(alert.reg_no.as_str())),
            ("DATE", display_date(alert.attendance_date)),
        ],
    )
}

#[must_use]
pub fn render_reset_code(code: &str, expiry_minutes: i64) -> String {
    fill_template(
        RESET_CODE_TEMPLATE,
        &[("CODE", escape_html(code)), ("EXPIRY_MINUTES", expiry_minutes.to_string())],
    )
}

/// Substitute `{{NAME}}` placeholders in one pass over the template.
/// Inserted values are never scanned again; unknown names are kept as is.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(name);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "resend_test.rs"]
mod tests;
