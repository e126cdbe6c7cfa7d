//! Student routes — attendance submission and the device lock cookie.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use super::{ApiError, api_error, store_error_to_status};
use crate::services::attendance::{self, AttendanceError, Submission, SubmitOutcome};
use crate::services::device_lock::{DEVICE_LOCK_COOKIE, DeviceLock};
use crate::state::AppState;
use crate::store::RegNo;

const DEVICE_LOCK_MAX_AGE_DAYS: i64 = 365;

fn lock_from_jar(jar: &CookieJar) -> DeviceLock {
    DeviceLock::from_cookie(jar.get(DEVICE_LOCK_COOKIE).map(Cookie::value))
}

fn lock_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((DEVICE_LOCK_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub(crate) fn attendance_error_to_status(err: AttendanceError) -> ApiError {
    match err {
        AttendanceError::Store(e) => store_error_to_status(e),
        AttendanceError::Locked(_) => api_error(StatusCode::CONFLICT, err.to_string()),
        AttendanceError::MissingRegNo
        | AttendanceError::InvalidRegNo(_)
        | AttendanceError::MissingName
        | AttendanceError::MissingPhoto
        | AttendanceError::InvalidPhoto(_)
        | AttendanceError::ConfirmationRequired => api_error(StatusCode::BAD_REQUEST, err.to_string()),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub already_recorded: bool,
    pub reg_no: RegNo,
    pub name: String,
    pub date: Date,
    pub time: String,
}

/// `POST /api/attendance` — record today's attendance and bind the device.
pub async fn submit_attendance(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<Submission>,
) -> Result<(CookieJar, Json<SubmitResponse>), ApiError> {
    let lock = lock_from_jar(&jar);
    let (outcome, lock) = attendance::submit_attendance(
        state.store.as_ref(),
        &lock,
        body,
        state.config.local_now(),
        state.config.max_photo_bytes,
    )
    .await
    .map_err(|e| {
        if matches!(e, AttendanceError::Locked(_)) {
            tracing::warn!(error = %e, "submission from locked device");
        }
        attendance_error_to_status(e)
    })?;

    let already_recorded = matches!(outcome, SubmitOutcome::AlreadyRecorded(_));
    let record = outcome.record();
    let response = SubmitResponse {
        already_recorded,
        reg_no: record.reg_no.clone(),
        name: record.name.clone(),
        date: record.date,
        time: record.time.clone(),
    };

    let bound = lock.bound().map(ToString::to_string).unwrap_or_default();
    let cookie = lock_cookie(bound, state.config.cookie_secure, Duration::days(DEVICE_LOCK_MAX_AGE_DAYS));
    Ok((jar.add(cookie), Json(response)))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceStatus {
    pub locked: bool,
    pub reg_no: Option<RegNo>,
}

impl From<&DeviceLock> for DeviceStatus {
    fn from(lock: &DeviceLock) -> Self {
        Self { locked: lock.bound().is_some(), reg_no: lock.bound().cloned() }
    }
}

/// `GET /api/device` — which student, if any, this device is bound to.
pub async fn device_status(jar: CookieJar) -> Json<DeviceStatus> {
    Json(DeviceStatus::from(&lock_from_jar(&jar)))
}

/// `POST /api/device/unlock` — clear the binding.
pub async fn unlock_device(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<DeviceStatus>) {
    let mut lock = lock_from_jar(&jar);
    if let Some(bound) = lock.bound() {
        tracing::info!(reg_no = %bound, "device lock reset");
    }
    lock.reset();
    let cleared = lock_cookie(String::new(), state.config.cookie_secure, Duration::ZERO);
    (jar.add(cleared), Json(DeviceStatus::from(&lock)))
}

#[cfg(test)]
#[path = "student_test.rs"]
mod tests;
