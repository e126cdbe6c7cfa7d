//! Roster service — the registered-student list.
//!
//! Staff add and delete students; nothing else mutates them. Input is
//! validated and normalized before the store is touched.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;

use crate::store::{RegNo, RegNoError, Store, StoreError, Student};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("student name is required")]
    MissingName,
    #[error(transparent)]
    RegNo(#[from] RegNoError),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("student not found: {0}")]
    NotFound(RegNo),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request body for adding a student.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewStudent {
    pub name: String,
    pub reg_no: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub parent_email: Option<String>,
}

/// Trimmed, upper-cased key; `None` for blank or malformed input.
#[must_use]
pub fn normalize_reg_no(raw: &str) -> Option<RegNo> {
    RegNo::parse(raw).ok()
}

/// Lower-cased address with exactly one `@` and non-empty sides.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// Blank optional strings become `None`; anything else must be a valid address.
fn optional_email(raw: Option<&str>) -> Result<Option<String>, RosterError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => normalize_email(v)
            .map(Some)
            .ok_or_else(|| RosterError::InvalidEmail(v.to_owned())),
    }
}

/// Validate and store a student. An existing student with the same
/// registration number is replaced.
///
/// When no parent email is given the student's own email is used as the
/// alert contact.
///
/// # Errors
///
/// Validation errors are returned before any store call.
pub async fn add_student(store: &dyn Store, new: NewStudent, now: OffsetDateTime) -> Result<Student, RosterError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(RosterError::MissingName);
    }
    let reg_no = RegNo::parse(&new.reg_no)?;
    let email = optional_email(new.email.as_deref())?;
    let parent_email = optional_email(new.parent_email.as_deref())?.or_else(|| email.clone());

    let student = Student { reg_no, name: name.to_owned(), email, parent_email, added: now };
    store.upsert_student(&student).await?;
    info!(reg_no = %student.reg_no, "student added");
    Ok(student)
}

/// # Errors
///
/// [`RosterError::NotFound`] when no such student is registered.
pub async fn delete_student(store: &dyn Store, raw_reg_no: &str) -> Result<RegNo, RosterError> {
    let reg_no = RegNo::parse(raw_reg_no)?;
    if !store.remove_student(&reg_no).await? {
        return Err(RosterError::NotFound(reg_no));
    }
    info!(%reg_no, "student deleted");
    Ok(reg_no)
}

/// Students in the order they were added.
///
/// # Errors
///
/// Store failures only.
pub async fn list_students(store: &dyn Store) -> Result<Vec<Student>, RosterError> {
    Ok(store.list_students().await?)
}

/// Case-insensitive substring match on registration number or name.
#[must_use]
pub fn search_students<'a>(students: &'a [Student], query: &str) -> Vec<&'a Student> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return students.iter().collect();
    }
    students
        .iter()
        .filter(|s| s.reg_no.as_str().to_lowercase().contains(&needle) || s.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
#[path = "roster_test.rs"]
mod tests;
