//! Typed records persisted by the store.
//!
//! Every row read back from a backend is decoded into one of these structs;
//! anything that does not fit is rejected as malformed instead of being
//! passed along as loose JSON.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

const REG_NO_MAX_LEN: usize = 32;

// =============================================================================
// REGISTRATION NUMBER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegNoError {
    #[error("registration number is required")]
    Empty,
    #[error("registration number longer than {REG_NO_MAX_LEN} characters")]
    TooLong,
    #[error("registration number contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Student registration number: trimmed, upper-cased, `[A-Z0-9_-]{1,32}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegNo(String);

impl RegNo {
    /// Normalize raw user input into a registration number.
    ///
    /// # Errors
    ///
    /// Returns [`RegNoError`] when the trimmed value is empty, too long, or
    /// contains characters outside `A-Z`, `0-9`, `-`, `_`.
    pub fn parse(raw: &str) -> Result<Self, RegNoError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(RegNoError::Empty);
        }
        if normalized.len() > REG_NO_MAX_LEN {
            return Err(RegNoError::TooLong);
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(RegNoError::InvalidChar(bad));
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RegNo {
    type Error = RegNoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RegNo> for String {
    fn from(value: RegNo) -> Self {
        value.0
    }
}

impl std::fmt::Display for RegNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// Registered student. Created and deleted by staff, never otherwise mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub reg_no: RegNo,
    pub name: String,
    pub email: Option<String>,
    /// Contact used for absence alerts.
    pub parent_email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub added: OffsetDateTime,
}

/// One attendance submission. Keyed by `(reg_no, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub reg_no: RegNo,
    pub name: String,
    pub date: Date,
    /// Local wall-clock time of the submission, `HH:MM:SS`.
    pub time: String,
    /// Captured photo as a `data:image/...` URI.
    pub face: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Staff password record. There is only ever one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Argon2 PHC string.
    pub hash: String,
    pub email: Option<String>,
    pub last_updated: OffsetDateTime,
}

/// Live password-reset code for a staff email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCode {
    pub email: String,
    pub code_hash: String,
    pub expires_at: OffsetDateTime,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    pub token: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Result of a keyed attendance insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record already exists for the key; nothing was written.
    Existing(AttendanceRecord),
}
