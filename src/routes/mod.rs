//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the student endpoints, the staff API, and the staff
//! change feed under a single Axum router. Errors leave handlers as
//! `(StatusCode, Json<ErrorBody>)` so every failure carries a message.

pub mod auth;
pub mod feed;
pub mod staff;
pub mod student;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::store::StoreError;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/attendance", post(student::submit_attendance))
        .route("/api/device", get(student::device_status))
        .route("/api/device/unlock", post(student::unlock_device))
        .route("/api/staff/login", post(auth::login))
        .route("/api/staff/logout", post(auth::logout))
        .route("/api/staff/me", get(auth::me))
        .route("/api/staff/password", post(auth::change_password))
        .route("/api/staff/password/forgot", post(auth::forgot_password))
        .route("/api/staff/password/verify", post(auth::verify_reset_code))
        .route("/api/staff/password/reset", post(auth::reset_password))
        .route("/api/staff/students", get(staff::list_students).post(staff::add_student))
        .route("/api/staff/students/{reg_no}", delete(staff::delete_student))
        .route("/api/staff/attendance", get(staff::list_attendance))
        .route("/api/staff/attendance/clear", post(staff::clear_attendance))
        .route("/api/staff/absent", get(staff::list_absent))
        .route("/api/staff/stats", get(staff::stats))
        .route("/api/staff/analytics", get(staff::analytics))
        .route("/api/staff/notify", post(staff::notify_absent))
        .route("/api/staff/export/report.csv", get(staff::export_report))
        .route("/api/staff/export/summary.csv", get(staff::export_summary))
        .route("/api/staff/feed", get(feed::handle_feed))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

pub(crate) fn store_error_to_status(err: StoreError) -> ApiError {
    tracing::error!(error = %err, "store failure");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

// =============================================================================
// QUERY HELPERS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// The requested `?date=YYYY-MM-DD`, or today on campus.
pub(crate) fn resolve_date(state: &AppState, raw: Option<&str>) -> Result<Date, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(state.config.local_now().date()),
        Some(v) => Date::parse(v, format_description!("[year]-[month]-[day]"))
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("invalid date: {v}"))),
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
