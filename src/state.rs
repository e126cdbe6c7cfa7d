//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the store trait object, the optional mailer, the parsed config, and
//! the reset request limiter.
//! Everything is `Arc`-wrapped so cloning per request is cheap.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::rate_limit::RateLimiter;
use crate::store::Store;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Optional mail client. `None` if no mail provider is configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    pub config: Arc<AppConfig>,
    /// Per-address throttle on password-reset code requests.
    pub reset_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, mailer: Option<Arc<dyn Mailer>>, config: AppConfig) -> Self {
        let reset_limiter = RateLimiter::new(config.reset_request_limit, config.reset_request_window);
        Self { store, mailer, config: Arc::new(config), reset_limiter }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::macros::datetime;
    use time::{Date, OffsetDateTime};

    use crate::mail::{MailError, Notification};
    use crate::store::{AttendanceRecord, MemoryStore, RegNo, Student};

    /// Fixed reference instant used across tests.
    #[must_use]
    pub fn t0() -> OffsetDateTime {
        datetime!(2026-10-16 9:00 UTC)
    }

    #[must_use]
    pub fn student(reg_no: &str, name: &str, added: OffsetDateTime) -> Student {
        Student {
            reg_no: RegNo::parse(reg_no).expect("valid test reg_no"),
            name: name.to_owned(),
            email: None,
            parent_email: Some(format!("parent.{}@example.com", reg_no.to_ascii_lowercase())),
            added,
        }
    }

    #[must_use]
    pub fn record_at(reg_no: &str, date: Date, recorded_at: OffsetDateTime) -> AttendanceRecord {
        AttendanceRecord {
            reg_no: RegNo::parse(reg_no).expect("valid test reg_no"),
            name: format!("Student {reg_no}"),
            date,
            time: format!("{:02}:{:02}:{:02}", recorded_at.hour(), recorded_at.minute(), recorded_at.second()),
            face: None,
            recorded_at,
        }
    }

    /// Config with no inter-message delay so dispatch tests run instantly.
    #[must_use]
    pub fn test_config() -> AppConfig {
        AppConfig {
            notify_delay: std::time::Duration::ZERO,
            staff_email: Some("office@campus.edu".into()),
            bootstrap_password: Some("Bootstrap#2026".into()),
            ..AppConfig::default()
        }
    }

    /// Create a test `AppState` over an empty `MemoryStore` with no mailer.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), None, test_config())
    }

    /// Create a test `AppState` with a mock mailer.
    #[must_use]
    pub fn test_app_state_with_mailer(mailer: Arc<dyn Mailer>) -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), Some(mailer), test_config())
    }

    /// Serve the full router on an ephemeral local port.
    pub async fn spawn_app(state: AppState) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("test listener addr");
        tokio::spawn(async move {
            axum::serve(listener, crate::routes::app(state)).await.expect("test server");
        });
        addr
    }

    /// Records every notification; fails for recipients listed in `fail_for`.
    #[derive(Default)]
    pub struct MockMailer {
        pub sent: Mutex<Vec<Notification>>,
        pub fail_for: Vec<String>,
    }

    impl MockMailer {
        #[must_use]
        pub fn failing_for(recipients: &[&str]) -> Self {
            Self { sent: Mutex::new(Vec::new()), fail_for: recipients.iter().map(|r| (*r).to_owned()).collect() }
        }

        #[must_use]
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().expect("mock mailer lock").clone()
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, notification: &Notification) -> Result<(), MailError> {
            if self.fail_for.iter().any(|r| r == notification.recipient()) {
                return Err(MailError::Rejected { status: 400, body: "mock rejection".into() });
            }
            self.sent.lock().expect("mock mailer lock").push(notification.clone());
            Ok(())
        }
    }
}
