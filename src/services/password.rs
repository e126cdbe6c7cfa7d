//! Staff password — strength rules, hashing, login check, and change flow.
//!
//! There is a single staff password. Until one has been stored, login
//! accepts `STAFF_BOOTSTRAP_PASSWORD` (when configured) so the first staff
//! member can sign in and set a real one.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use time::OffsetDateTime;
use tracing::info;

use crate::store::{PasswordConfig, Store, StoreError};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("all password fields are required")]
    MissingFields,
    #[error("new passwords do not match")]
    Mismatch,
    #[error("new password must differ from the current password")]
    Unchanged,
    #[error("{}", .0.join("; "))]
    Weak(Vec<&'static str>),
    #[error("current password is incorrect")]
    IncorrectCurrent,
    #[error("invalid password")]
    InvalidCredentials,
    #[error("no staff password has been set")]
    NotConfigured,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// RULES
// =============================================================================

/// Check the five strength rules, returning every failed rule in order.
///
/// # Errors
///
/// The messages of each rule the password fails.
pub fn validate_password_strength(password: &str) -> Result<(), Vec<&'static str>> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain a number");
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push("Password must contain a special character");
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// =============================================================================
// HASHING
// =============================================================================

/// Argon2id PHC string with a random salt.
///
/// # Errors
///
/// [`PasswordError::Hash`] if the hasher rejects its parameters.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `false` for a wrong password and for an unparsable hash.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Check `password` against the stored hash, or against `bootstrap` while no
/// password has been stored.
///
/// # Errors
///
/// [`PasswordError::InvalidCredentials`] on mismatch,
/// [`PasswordError::NotConfigured`] when there is nothing to compare with.
pub async fn verify_login(store: &dyn Store, password: &str, bootstrap: Option<&str>) -> Result<(), PasswordError> {
    match store.password_config().await? {
        Some(config) => {
            if verify_password(password, &config.hash) {
                Ok(())
            } else {
                Err(PasswordError::InvalidCredentials)
            }
        }
        None => match bootstrap {
            Some(expected) if !password.is_empty() && password == expected => Ok(()),
            Some(_) => Err(PasswordError::InvalidCredentials),
            None => Err(PasswordError::NotConfigured),
        },
    }
}

/// Validate and store a new password. Field checks run before the current
/// password is verified, and nothing is hashed until every check passes.
///
/// # Errors
///
/// See [`PasswordError`]; `IncorrectCurrent` when `current` does not verify.
pub async fn change_password(
    store: &dyn Store,
    current: &str,
    new: &str,
    confirm: &str,
    bootstrap: Option<&str>,
    now: OffsetDateTime,
) -> Result<(), PasswordError> {
    if current.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err(PasswordError::MissingFields);
    }
    if new != confirm {
        return Err(PasswordError::Mismatch);
    }
    if new == current {
        return Err(PasswordError::Unchanged);
    }
    validate_password_strength(new).map_err(PasswordError::Weak)?;

    let existing = store.password_config().await?;
    let email = existing.as_ref().and_then(|c| c.email.clone());
    verify_login(store, current, bootstrap).await.map_err(|e| match e {
        PasswordError::InvalidCredentials | PasswordError::NotConfigured => PasswordError::IncorrectCurrent,
        other => other,
    })?;

    store_password(store, new, email, now).await?;
    info!("staff password changed");
    Ok(())
}

/// Hash and persist `password`, replacing any previous one.
pub(crate) async fn store_password(
    store: &dyn Store,
    password: &str,
    email: Option<String>,
    now: OffsetDateTime,
) -> Result<(), PasswordError> {
    let hash = hash_password(password)?;
    store.put_password_config(&PasswordConfig { hash, email, last_updated: now }).await?;
    Ok(())
}

#[cfg(test)]
#[path = "password_test.rs"]
mod tests;
