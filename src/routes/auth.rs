//! Staff auth routes — login, logout, password change, and code-based reset.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::{ApiError, api_error, store_error_to_status};
use crate::services::password::{self, PasswordError};
use crate::services::password_reset::{self, ResetError, ResetPolicy};
use crate::services::roster::normalize_email;
use crate::services::session;
use crate::state::AppState;
use crate::store::StaffSession;

pub const SESSION_COOKIE: &str = "staff_session";

fn session_cookie(token: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

fn cleared_session_cookie(secure: bool) -> Cookie<'static> {
    session_cookie(String::new(), secure, Duration::ZERO)
}

fn reset_policy(state: &AppState) -> ResetPolicy {
    ResetPolicy { ttl: state.config.reset_code_ttl, max_attempts: state.config.reset_max_attempts }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated staff member. Reads `Authorization: Bearer <token>` first,
/// then the `staff_session` cookie.
pub struct StaffUser {
    pub session: StaffSession,
}

pub(crate) fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|t| !t.is_empty())
}

impl<S> axum::extract::FromRequestParts<S> for StaffUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = || api_error(StatusCode::UNAUTHORIZED, "staff login required");
        let token = token_from_headers(&parts.headers).ok_or_else(unauthorized)?;

        let app_state = AppState::from_ref(state);
        let session = session::validate_session(app_state.store.as_ref(), &token, OffsetDateTime::now_utc())
            .await
            .map_err(store_error_to_status)?
            .ok_or_else(unauthorized)?;

        Ok(Self { session })
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn password_error_to_status(err: PasswordError) -> ApiError {
    let status = match &err {
        PasswordError::MissingFields | PasswordError::Mismatch | PasswordError::Unchanged | PasswordError::Weak(_) => {
            StatusCode::BAD_REQUEST
        }
        PasswordError::IncorrectCurrent => StatusCode::FORBIDDEN,
        PasswordError::InvalidCredentials | PasswordError::NotConfigured => StatusCode::UNAUTHORIZED,
        PasswordError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PasswordError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, err.to_string())
}

pub(crate) fn reset_error_to_status(err: ResetError) -> ApiError {
    match err {
        ResetError::Password(e) => password_error_to_status(e),
        ResetError::Store(e) => store_error_to_status(e),
        ResetError::InvalidEmail | ResetError::UnknownEmail | ResetError::InvalidCode => {
            api_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        ResetError::VerificationFailed => api_error(StatusCode::UNAUTHORIZED, err.to_string()),
        ResetError::Delivery(_) => {
            tracing::error!(error = %err, "reset code delivery failed");
            api_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginBody {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// `POST /api/staff/login` — check the password and start a session.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let store = state.store.as_ref();
    password::verify_login(store, &body.password, state.config.bootstrap_password.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "staff login rejected");
            password_error_to_status(e)
        })?;

    let created = session::create_session(store, state.config.session_ttl, OffsetDateTime::now_utc())
        .await
        .map_err(store_error_to_status)?;
    tracing::info!("staff session started");

    let cookie = session_cookie(created.token.clone(), state.config.cookie_secure, state.config.session_ttl);
    Ok((jar.add(cookie), Json(SessionResponse { token: created.token, expires_at: created.expires_at })))
}

/// `POST /api/staff/logout` — delete the session and clear the cookie.
pub async fn logout(State(state): State<AppState>, staff: StaffUser, jar: CookieJar) -> impl IntoResponse {
    if let Err(e) = session::delete_session(state.store.as_ref(), &staff.session.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }
    (jar.add(cleared_session_cookie(state.config.cookie_secure)), StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub campus_name: String,
}

/// `GET /api/staff/me` — current session details.
pub async fn me(State(state): State<AppState>, staff: StaffUser) -> Json<MeResponse> {
    Json(MeResponse {
        created_at: staff.session.created_at,
        expires_at: staff.session.expires_at,
        campus_name: state.config.campus_name.clone(),
    })
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordBody {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// `POST /api/staff/password` — change the staff password.
pub async fn change_password(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<ChangePasswordBody>,
) -> Result<StatusCode, ApiError> {
    password::change_password(
        state.store.as_ref(),
        &body.current_password,
        &body.new_password,
        &body.confirm_password,
        state.config.bootstrap_password.as_deref(),
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(password_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordBody {
    pub email: String,
}

/// `POST /api/staff/password/forgot` — mail a reset code to the staff contact.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(mailer) = state.mailer.as_deref() else {
        return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "email not configured"));
    };
    if let Some(email) = normalize_email(&body.email) {
        if let Err(e) = state.reset_limiter.check_and_record(&email) {
            tracing::warn!(error = %e, "reset request throttled");
            return Err(api_error(StatusCode::TOO_MANY_REQUESTS, e.to_string()));
        }
    }
    let policy = reset_policy(&state);
    password_reset::request_reset(
        state.store.as_ref(),
        mailer,
        &body.email,
        state.config.staff_email.as_deref(),
        policy,
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(reset_error_to_status)?;
    Ok(Json(serde_json::json!({ "sent": true, "expires_in_minutes": policy.ttl.whole_minutes() })))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/staff/password/verify` — check a code without using it up.
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    password_reset::verify_code(
        state.store.as_ref(),
        &body.email,
        &body.code,
        reset_policy(&state),
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(reset_error_to_status)?;
    Ok(Json(serde_json::json!({ "valid": true })))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordBody {
    pub email: String,
    pub code: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// `POST /api/staff/password/reset` — set a new password with a valid code.
/// Every session is revoked, including the caller's cookie.
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<ResetPasswordBody>,
) -> Result<(CookieJar, StatusCode), ApiError> {
    password_reset::reset_password(
        state.store.as_ref(),
        &body.email,
        &body.code,
        &body.new_password,
        &body.confirm_password,
        reset_policy(&state),
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(reset_error_to_status)?;
    Ok((jar.add(cleared_session_cookie(state.config.cookie_secure)), StatusCode::NO_CONTENT))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
