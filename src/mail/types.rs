//! Mail types — provider-neutral notifications and errors.

use async_trait::async_trait;
use time::Date;

use crate::store::RegNo;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by mail client operations.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// A required environment variable is not set.
    #[error("missing mail setting: env var {var} not set")]
    MissingVar { var: &'static str },

    /// The HTTP request to the provider failed.
    #[error("mail request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("mail provider rejected message: status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Parent notification for one absent student on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceAlert {
    pub parent_email: String,
    pub parent_name: String,
    pub student_name: String,
    pub reg_no: RegNo,
    pub attendance_date: Date,
}

/// Every message the service sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    AbsenceAlert(AbsenceAlert),
    /// One-time password-reset code for the staff contact.
    ResetCode { email: String, code: String, expiry_minutes: i64 },
}

impl Notification {
    /// Address the message is delivered to.
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::AbsenceAlert(alert) => &alert.parent_email,
            Self::ResetCode { email, .. } => email,
        }
    }
}

/// Format an attendance date the way it appears in outgoing mail.
#[must_use]
pub fn display_date(date: Date) -> String {
    format!("{} {}, {}", date.month(), date.day(), date.year())
}

// =============================================================================
// MAILER TRAIT
// =============================================================================

/// Transactional email seam. Implemented by [`super::MailClient`] in
/// production and by mocks in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the provider is unreachable or rejects the
    /// message. Callers decide whether that is fatal.
    async fn send(&self, notification: &Notification) -> Result<(), MailError>;
}
