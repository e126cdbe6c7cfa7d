//! Mail — transactional email for absence alerts and reset codes.
//!
//! DESIGN
//! ======
//! The `MailClient` enum dispatches to EmailJS or Resend based on
//! `MAIL_PROVIDER`. Services depend only on the [`Mailer`] trait so tests can
//! substitute a recording mock. A missing provider is not fatal at startup:
//! the mail-backed endpoints answer `503` instead.

pub mod config;
pub mod emailjs;
pub mod resend;
pub mod types;

use config::{MailConfig, MailProvider};
pub use types::{AbsenceAlert, MailError, Mailer, Notification};

// =============================================================================
// CLIENT DISPATCH
// =============================================================================

/// Concrete mail client configured by [`MailClient::from_env`].
pub struct MailClient {
    inner: MailBackend,
}

enum MailBackend {
    EmailJs(emailjs::EmailJsClient),
    Resend(resend::ResendClient),
}

impl MailClient {
    /// Build a mail client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required provider settings are missing or the HTTP
    /// client fails to build.
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_config(MailConfig::from_env()?)
    }

    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: MailConfig) -> Result<Self, MailError> {
        let inner = match config.provider {
            MailProvider::EmailJs(settings) => {
                MailBackend::EmailJs(emailjs::EmailJsClient::new(settings, config.request_timeout_secs)?)
            }
            MailProvider::Resend(settings) => MailBackend::Resend(resend::ResendClient::new(settings)),
        };
        Ok(Self { inner })
    }

    /// Provider name for logs.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self.inner {
            MailBackend::EmailJs(_) => "emailjs",
            MailBackend::Resend(_) => "resend",
        }
    }
}

#[async_trait::async_trait]
impl Mailer for MailClient {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        match &self.inner {
            MailBackend::EmailJs(c) => c.send(notification).await,
            MailBackend::Resend(c) => c.send(notification).await,
        }
    }
}
