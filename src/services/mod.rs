//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and talk to the `Store` and `Mailer`
//! traits, so route handlers stay focused on protocol translation, cookies,
//! and auth plumbing. Pure helpers (absence, export, password rules) take
//! plain slices and are tested without any backend.

pub mod absence;
pub mod attendance;
pub mod device_lock;
pub mod export;
pub mod notify;
pub mod password;
pub mod password_reset;
pub mod roster;
pub mod session;
