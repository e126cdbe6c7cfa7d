//! Password reset by emailed one-time code.
//!
//! DESIGN
//! ======
//! A reset code is six decimal digits mailed to the staff contact. Only its
//! sha256 hash is stored, with an expiry and a failed-attempt counter. A code
//! dies when it expires, when it is used, or when the attempt limit is hit.
//! A successful reset revokes every staff session.

use rand::Rng;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use super::password::{PasswordError, store_password, validate_password_strength};
use super::roster::normalize_email;
use super::session::bytes_to_hex;
use crate::mail::{MailError, Mailer, Notification};
use crate::store::{ResetCode, Store, StoreError};

pub const CODE_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("email does not match the staff contact")]
    UnknownEmail,
    #[error("code must be {CODE_LEN} digits")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("email delivery failed: {0}")]
    Delivery(#[from] MailError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Limits applied to reset codes.
#[derive(Debug, Clone, Copy)]
pub struct ResetPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
}

/// Six digits, first one non-zero.
#[must_use]
pub fn generate_reset_code() -> String {
    rand::rng().random_range(100_000..1_000_000u32).to_string()
}

#[must_use]
pub fn validate_code_format(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

#[must_use]
pub fn hash_reset_code(code: &str) -> String {
    bytes_to_hex(&Sha256::digest(code.as_bytes()))
}

/// The address allowed to reset: the one stored with the password, else the
/// configured staff email.
async fn staff_contact(store: &dyn Store, fallback: Option<&str>) -> Result<Option<String>, StoreError> {
    let stored = store.password_config().await?.and_then(|c| c.email);
    Ok(stored.or_else(|| fallback.and_then(normalize_email)))
}

async fn authorized_email(store: &dyn Store, email: &str, fallback: Option<&str>) -> Result<String, ResetError> {
    let normalized = normalize_email(email).ok_or(ResetError::InvalidEmail)?;
    match staff_contact(store, fallback).await? {
        Some(contact) if contact == normalized => Ok(normalized),
        _ => Err(ResetError::UnknownEmail),
    }
}

/// Issue a fresh code for the staff contact and mail it. Any live code for
/// the address is replaced.
///
/// # Errors
///
/// [`ResetError::UnknownEmail`] unless `email` is the staff contact;
/// [`ResetError::Delivery`] if the mail provider fails, in which case the
/// code is discarded.
pub async fn request_reset(
    store: &dyn Store,
    mailer: &dyn Mailer,
    email: &str,
    staff_email: Option<&str>,
    policy: ResetPolicy,
    now: OffsetDateTime,
) -> Result<(), ResetError> {
    let email = authorized_email(store, email, staff_email).await?;

    let code = generate_reset_code();
    store
        .put_reset_code(&ResetCode {
            email: email.clone(),
            code_hash: hash_reset_code(&code),
            expires_at: now + policy.ttl,
            attempts: 0,
        })
        .await?;

    let notification = Notification::ResetCode { email: email.clone(), code, expiry_minutes: policy.ttl.whole_minutes() };
    if let Err(e) = mailer.send(&notification).await {
        warn!(error = %e, "reset code delivery failed");
        store.delete_reset_code(&email).await?;
        return Err(ResetError::Delivery(e));
    }

    info!("password reset code sent");
    Ok(())
}

/// Check a code without consuming it. A wrong code counts as an attempt.
///
/// # Errors
///
/// [`ResetError::VerificationFailed`] for a missing, expired, exhausted, or
/// wrong code.
pub async fn verify_code(
    store: &dyn Store,
    email: &str,
    code: &str,
    policy: ResetPolicy,
    now: OffsetDateTime,
) -> Result<String, ResetError> {
    check_code(store, email, code, policy, now, false).await
}

async fn check_code(
    store: &dyn Store,
    email: &str,
    code: &str,
    policy: ResetPolicy,
    now: OffsetDateTime,
    consume: bool,
) -> Result<String, ResetError> {
    let email = normalize_email(email).ok_or(ResetError::InvalidEmail)?;
    let code = code.trim();
    if !validate_code_format(code) {
        return Err(ResetError::InvalidCode);
    }

    let accepted = store
        .check_reset_code(&email, &hash_reset_code(code), now, policy.max_attempts, consume)
        .await?;
    if !accepted {
        return Err(ResetError::VerificationFailed);
    }
    Ok(email)
}

/// Set a new password using a valid code. The code is consumed and every
/// staff session is revoked.
///
/// # Errors
///
/// Password rule failures are returned before the code is checked, so they
/// do not cost an attempt.
pub async fn reset_password(
    store: &dyn Store,
    email: &str,
    code: &str,
    new: &str,
    confirm: &str,
    policy: ResetPolicy,
    now: OffsetDateTime,
) -> Result<(), ResetError> {
    if new.is_empty() || confirm.is_empty() {
        return Err(PasswordError::MissingFields.into());
    }
    if new != confirm {
        return Err(PasswordError::Mismatch.into());
    }
    validate_password_strength(new).map_err(PasswordError::Weak)?;

    let email = check_code(store, email, code, policy, now, true).await?;
    store_password(store, new, Some(email), now).await?;
    store.delete_all_sessions().await?;
    info!("staff password reset; sessions revoked");
    Ok(())
}

#[cfg(test)]
#[path = "password_reset_test.rs"]
mod tests;
