//! Staff routes — roster, attendance review, statistics, alerts, and export.
//!
//! Every handler requires a [`StaffUser`]. Dates default to today at the
//! campus offset and can be overridden with `?date=YYYY-MM-DD`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use super::auth::StaffUser;
use super::student::attendance_error_to_status;
use super::{ApiError, DateQuery, api_error, resolve_date, store_error_to_status};
use crate::services::absence::{self, AbsentStudent, DailyStatistics, DashboardStats, StudentAnalytics};
use crate::services::attendance;
use crate::services::export::{self, ExportError};
use crate::services::notify::{self, DispatchReport};
use crate::services::roster::{self, NewStudent, RosterError};
use crate::state::AppState;
use crate::store::{AttendanceRecord, Student};

const DEFAULT_ANALYTICS_DAYS: i64 = 30;

pub(crate) fn roster_error_to_status(err: RosterError) -> ApiError {
    match err {
        RosterError::Store(e) => store_error_to_status(e),
        RosterError::NotFound(_) => api_error(StatusCode::NOT_FOUND, err.to_string()),
        RosterError::MissingName | RosterError::RegNo(_) | RosterError::InvalidEmail(_) => {
            api_error(StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

pub(crate) fn export_error_to_status(err: ExportError) -> ApiError {
    match err {
        ExportError::NoData => api_error(StatusCode::NOT_FOUND, err.to_string()),
    }
}

/// Roster and the day's records.
async fn day_snapshot(state: &AppState, date: Date) -> Result<(Vec<Student>, Vec<AttendanceRecord>), ApiError> {
    let students = state.store.list_students().await.map_err(store_error_to_status)?;
    let present = state.store.list_attendance(date).await.map_err(store_error_to_status)?;
    Ok((students, present))
}

fn csv_response(file_name: &str, csv: String) -> Response {
    let stream = futures::stream::iter(std::iter::once(Ok::<axum::body::Bytes, std::convert::Infallible>(
        axum::body::Bytes::from(csv),
    )));
    let body = axum::body::Body::from_stream(stream);
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, &format!("attachment; filename=\"{file_name}\"")),
        ],
        body,
    )
        .into_response()
}

// =============================================================================
// ROSTER
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// `GET /api/staff/students` — roster in added order, optionally filtered.
pub async fn list_students(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Student>>, ApiError> {
    let students = roster::list_students(state.store.as_ref())
        .await
        .map_err(roster_error_to_status)?;
    let filtered = match query.q.as_deref() {
        Some(q) => roster::search_students(&students, q).into_iter().cloned().collect(),
        None => students,
    };
    Ok(Json(filtered))
}

/// `POST /api/staff/students` — add or replace a student.
pub async fn add_student(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<NewStudent>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let student = roster::add_student(state.store.as_ref(), body, state.config.local_now())
        .await
        .map_err(roster_error_to_status)?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// `DELETE /api/staff/students/{reg_no}`
pub async fn delete_student(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(reg_no): Path<String>,
) -> Result<StatusCode, ApiError> {
    roster::delete_student(state.store.as_ref(), &reg_no)
        .await
        .map_err(roster_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ATTENDANCE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AttendanceList {
    pub date: Date,
    pub records: Vec<AttendanceRecord>,
}

/// `GET /api/staff/attendance` — the day's records, most recent first.
pub async fn list_attendance(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<AttendanceList>, ApiError> {
    let date = resolve_date(&state, query.date.as_deref())?;
    let records = attendance::list_attendance(state.store.as_ref(), date)
        .await
        .map_err(attendance_error_to_status)?;
    Ok(Json(AttendanceList { date, records }))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearBody {
    pub confirm: String,
}

/// `POST /api/staff/attendance/clear` — delete every record; body must be
/// `{"confirm":"DELETE"}`.
pub async fn clear_attendance(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<ClearBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = attendance::clear_attendance(state.store.as_ref(), &body.confirm)
        .await
        .map_err(attendance_error_to_status)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[derive(Debug, Serialize)]
pub struct AbsentList {
    pub date: Date,
    pub absent: Vec<AbsentStudent>,
}

/// `GET /api/staff/absent`
pub async fn list_absent(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<AbsentList>, ApiError> {
    let date = resolve_date(&state, query.date.as_deref())?;
    let (students, present) = day_snapshot(&state, date).await?;
    Ok(Json(AbsentList { date, absent: absence::compute_absent(&students, &present) }))
}

/// `GET /api/staff/stats`
pub async fn stats(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<DashboardStats>, ApiError> {
    let date = resolve_date(&state, query.date.as_deref())?;
    let (students, present) = day_snapshot(&state, date).await?;
    Ok(Json(absence::dashboard_stats(&students, &present)))
}

// =============================================================================
// ANALYTICS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub from: Date,
    pub to: Date,
    /// Distinct dates in the window with at least one record.
    pub days: usize,
    pub daily: Vec<DailyStatistics>,
    pub students: Vec<StudentAnalytics>,
}

/// `GET /api/staff/analytics?from=&to=` — defaults to the last 30 days.
pub async fn analytics(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let to = resolve_date(&state, query.to.as_deref())?;
    let from = match query.from.as_deref() {
        Some(raw) => resolve_date(&state, Some(raw))?,
        None => to
            .checked_sub(Duration::days(DEFAULT_ANALYTICS_DAYS - 1))
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "to is too early for the default window"))?,
    };
    if from > to {
        return Err(api_error(StatusCode::BAD_REQUEST, "from must not be after to"));
    }

    let students = state.store.list_students().await.map_err(store_error_to_status)?;
    let records = state
        .store
        .list_attendance_range(from, to)
        .await
        .map_err(store_error_to_status)?;
    let days = absence::distinct_days(&records);

    Ok(Json(AnalyticsReport {
        from,
        to,
        days,
        daily: absence::daily_statistics(&students, &records),
        students: absence::student_attendance_rates(&students, &records, days),
    }))
}

// =============================================================================
// NOTIFY
// =============================================================================

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub date: Date,
    /// Set when there was nothing to send.
    pub message: Option<String>,
    #[serde(flatten)]
    pub report: DispatchReport,
}

/// `POST /api/staff/notify` — mail every absent student's parent.
pub async fn notify_absent(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let date = resolve_date(&state, query.date.as_deref())?;
    let (students, present) = day_snapshot(&state, date).await?;
    let absent = absence::compute_absent(&students, &present);

    let batch = notify::alerts_for(&absent, date);
    let nothing_to_send = if absent.is_empty() {
        Some("No absent students to notify")
    } else if batch.alerts.is_empty() {
        Some("No parent emails configured")
    } else {
        None
    };
    if let Some(message) = nothing_to_send {
        return Ok(Json(NotifyResponse {
            date,
            message: Some(message.to_owned()),
            report: DispatchReport { skipped: batch.skipped, ..DispatchReport::default() },
        }));
    }

    let Some(mailer) = state.mailer.as_deref() else {
        return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "email not configured"));
    };
    let mut report =
        notify::dispatch_alerts(mailer, &batch.alerts, state.config.notify_delay, state.config.notify_max_errors).await;
    report.skipped = batch.skipped;
    Ok(Json(NotifyResponse { date, message: None, report }))
}

// =============================================================================
// EXPORT
// =============================================================================

/// `GET /api/staff/export/report.csv`
pub async fn export_report(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = resolve_date(&state, query.date.as_deref())?;
    let (students, present) = day_snapshot(&state, date).await?;
    let absent = absence::compute_absent(&students, &present);

    let rows = export::report_rows(&present, &absent, date);
    let csv = export::render_report_csv(&rows).map_err(export_error_to_status)?;
    Ok(csv_response(&export::report_file_name(date), csv))
}

/// `GET /api/staff/export/summary.csv`
pub async fn export_summary(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = resolve_date(&state, query.date.as_deref())?;
    let (students, present) = day_snapshot(&state, date).await?;
    let stats = absence::dashboard_stats(&students, &present);
    let absent = absence::compute_absent(&students, &present);

    let csv = export::render_summary_csv(&stats, &absent, state.config.local_now());
    Ok(csv_response(&export::summary_file_name(date), csv))
}

#[cfg(test)]
#[path = "staff_test.rs"]
mod tests;
