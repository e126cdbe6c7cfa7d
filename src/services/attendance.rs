//! Attendance service — student submissions and staff bulk operations.
//!
//! DESIGN
//! ======
//! A submission is validated completely before the store is touched, then
//! checked against the caller's device lock, then written with an
//! insert-if-absent on `(reg_no, date)`. A repeat submission for the same
//! day is not an error: the caller gets the record that already exists.
//!
//! The photo is accepted as a `data:image/<type>;base64,<payload>` URI and
//! stored as-is. It is size-checked and shape-checked, never decoded.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tracing::info;

use super::device_lock::{DeviceLock, DeviceLockError};
use crate::store::{AttendanceRecord, InsertOutcome, RegNo, RegNoError, Store, StoreError};

pub const CLEAR_CONFIRMATION: &str = "DELETE";

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("registration number is required")]
    MissingRegNo,
    #[error(transparent)]
    InvalidRegNo(RegNoError),
    #[error("name is required")]
    MissingName,
    #[error("a photo is required")]
    MissingPhoto,
    #[error("invalid photo: {0}")]
    InvalidPhoto(&'static str),
    #[error(transparent)]
    Locked(#[from] DeviceLockError),
    #[error("type {CLEAR_CONFIRMATION} to confirm")]
    ConfirmationRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request body for a student submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Submission {
    pub name: String,
    pub reg_no: String,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Recorded(AttendanceRecord),
    /// The student already has a record for the day; nothing was written.
    AlreadyRecorded(AttendanceRecord),
}

impl SubmitOutcome {
    #[must_use]
    pub fn record(&self) -> &AttendanceRecord {
        match self {
            Self::Recorded(r) | Self::AlreadyRecorded(r) => r,
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// # Errors
///
/// [`AttendanceError::InvalidPhoto`] describing the first problem found.
pub fn validate_photo(photo: &str, max_bytes: usize) -> Result<(), AttendanceError> {
    if photo.len() > max_bytes {
        return Err(AttendanceError::InvalidPhoto("photo is too large"));
    }
    let rest = photo
        .strip_prefix("data:image/")
        .ok_or(AttendanceError::InvalidPhoto("expected an image data URI"))?;
    let (subtype, payload) = rest
        .split_once(";base64,")
        .ok_or(AttendanceError::InvalidPhoto("expected base64 encoding"))?;
    if subtype.is_empty()
        || !subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return Err(AttendanceError::InvalidPhoto("unknown image type"));
    }
    if payload.is_empty() {
        return Err(AttendanceError::InvalidPhoto("photo is empty"));
    }
    if !payload
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return Err(AttendanceError::InvalidPhoto("payload is not base64"));
    }
    Ok(())
}

struct ValidSubmission {
    reg_no: RegNo,
    name: String,
    photo: String,
}

fn validate_submission(submission: Submission, max_photo_bytes: usize) -> Result<ValidSubmission, AttendanceError> {
    if submission.reg_no.trim().is_empty() {
        return Err(AttendanceError::MissingRegNo);
    }
    let reg_no = RegNo::parse(&submission.reg_no).map_err(AttendanceError::InvalidRegNo)?;
    let name = submission.name.trim();
    if name.is_empty() {
        return Err(AttendanceError::MissingName);
    }
    let photo = submission
        .photo
        .filter(|p| !p.trim().is_empty())
        .ok_or(AttendanceError::MissingPhoto)?;
    validate_photo(&photo, max_photo_bytes)?;
    Ok(ValidSubmission { reg_no, name: name.to_owned(), photo })
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Record today's attendance for a student.
///
/// `now` is campus-local time; its date is the record's day. On success the
/// returned lock is bound to the submitted registration number.
///
/// # Errors
///
/// Validation and lock errors are returned before any store write.
pub async fn submit_attendance(
    store: &dyn Store,
    lock: &DeviceLock,
    submission: Submission,
    now: OffsetDateTime,
    max_photo_bytes: usize,
) -> Result<(SubmitOutcome, DeviceLock), AttendanceError> {
    let valid = validate_submission(submission, max_photo_bytes)?;
    lock.check(&valid.reg_no)?;

    let record = AttendanceRecord {
        reg_no: valid.reg_no.clone(),
        name: valid.name,
        date: now.date(),
        time: format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second()),
        face: Some(valid.photo),
        recorded_at: now,
    };

    let outcome = match store.insert_attendance(&record).await? {
        InsertOutcome::Inserted => {
            info!(reg_no = %record.reg_no, date = %record.date, "attendance recorded");
            SubmitOutcome::Recorded(record)
        }
        InsertOutcome::Existing(existing) => {
            info!(reg_no = %existing.reg_no, date = %existing.date, "attendance already recorded");
            SubmitOutcome::AlreadyRecorded(existing)
        }
    };

    Ok((outcome, DeviceLock::bound_to(valid.reg_no)))
}

/// Records for `date`, most recent first.
///
/// # Errors
///
/// Store failures only.
pub async fn list_attendance(store: &dyn Store, date: Date) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    Ok(store.list_attendance(date).await?)
}

/// Delete every attendance record. `confirmation` must be exactly `DELETE`.
///
/// # Errors
///
/// [`AttendanceError::ConfirmationRequired`] for any other confirmation.
pub async fn clear_attendance(store: &dyn Store, confirmation: &str) -> Result<u64, AttendanceError> {
    if confirmation != CLEAR_CONFIRMATION {
        return Err(AttendanceError::ConfirmationRequired);
    }
    let removed = store.clear_attendance().await?;
    info!(removed, "attendance cleared");
    Ok(removed)
}

#[cfg(test)]
#[path = "attendance_test.rs"]
mod tests;
