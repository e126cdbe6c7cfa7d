use std::sync::Arc;

use super::*;
use crate::mail::Notification;
use crate::state::test_helpers::{MockMailer, test_app_state, test_app_state_with_mailer};
use axum::extract::FromRequestParts;
use axum::http::Request;

const BOOTSTRAP: &str = "Bootstrap#2026";
const STAFF: &str = "office@campus.edu";

async fn login_with(state: &AppState, password: &str) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    login(State(state.clone()), CookieJar::new(), Json(LoginBody { password: password.into() })).await
}

fn parts_with(header: (&str, String)) -> axum::http::request::Parts {
    Request::builder()
        .uri("/api/staff/me")
        .header(header.0, header.1)
        .body(())
        .unwrap()
        .into_parts()
        .0
}

// =============================================================================
// token extraction
// =============================================================================

#[test]
fn bearer_header_wins_over_cookie() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
    headers.insert(axum::http::header::COOKIE, "staff_session=def".parse().unwrap());
    assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
}

#[test]
fn cookie_used_without_bearer() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(axum::http::header::COOKIE, "other=1; staff_session=def".parse().unwrap());
    assert_eq!(token_from_headers(&headers).as_deref(), Some("def"));
}

#[test]
fn missing_or_blank_token_is_none() {
    let mut headers = axum::http::HeaderMap::new();
    assert_eq!(token_from_headers(&headers), None);
    headers.insert(AUTHORIZATION, "Bearer   ".parse().unwrap());
    assert_eq!(token_from_headers(&headers), None);
}

// =============================================================================
// login / extractor / logout
// =============================================================================

#[tokio::test]
async fn login_with_bootstrap_sets_cookie_and_returns_token() {
    let state = test_app_state();
    let (jar, Json(resp)) = login_with(&state, BOOTSTRAP).await.unwrap();
    assert_eq!(resp.token.len(), 64);
    assert_eq!(jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()), Some(resp.token.clone()));
    assert!(state.store.session(&resp.token).await.unwrap().is_some());
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let state = test_app_state();
    let (status, Json(body)) = login_with(&state, "nope").await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.error, "invalid password");
}

#[tokio::test]
async fn extractor_accepts_bearer_and_rejects_unknown_tokens() {
    let state = test_app_state();
    let (_, Json(resp)) = login_with(&state, BOOTSTRAP).await.unwrap();

    let mut parts = parts_with(("authorization", format!("Bearer {}", resp.token)));
    let staff = StaffUser::from_request_parts(&mut parts, &state).await.ok().unwrap();
    assert_eq!(staff.session.token, resp.token);

    let mut parts = parts_with(("cookie", "staff_session=forged".into()));
    let Err((status, _)) = StaffUser::from_request_parts(&mut parts, &state).await else {
        panic!("forged token accepted");
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_deletes_session() {
    let state = test_app_state();
    let (_, Json(resp)) = login_with(&state, BOOTSTRAP).await.unwrap();
    let session = state.store.session(&resp.token).await.unwrap().unwrap();

    let response = logout(State(state.clone()), StaffUser { session }, CookieJar::new()).await.into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.store.session(&resp.token).await.unwrap().is_none());
}

// =============================================================================
// password change and reset
// =============================================================================

#[tokio::test]
async fn change_password_maps_errors() {
    let state = test_app_state();
    let (_, Json(resp)) = login_with(&state, BOOTSTRAP).await.unwrap();
    let staff = || async { StaffUser { session: state.store.session(&resp.token).await.unwrap().unwrap() } };

    let body = |current: &str, new: &str| ChangePasswordBody {
        current_password: current.into(),
        new_password: new.into(),
        confirm_password: new.into(),
    };

    let (status, _) =
        change_password(State(state.clone()), staff().await, Json(body(BOOTSTRAP, "weak"))).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) =
        change_password(State(state.clone()), staff().await, Json(body("wrong", "Str0ng!pass"))).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let ok = change_password(State(state.clone()), staff().await, Json(body(BOOTSTRAP, "Str0ng!pass"))).await;
    assert_eq!(ok.unwrap(), StatusCode::NO_CONTENT);
    assert!(login_with(&state, "Str0ng!pass").await.is_ok());
    assert!(login_with(&state, BOOTSTRAP).await.is_err());
}

#[tokio::test]
async fn forgot_password_without_mailer_is_unavailable() {
    let state = test_app_state();
    let (status, Json(body)) = forgot_password(State(state), Json(ForgotPasswordBody { email: STAFF.into() }))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.error, "email not configured");
}

#[tokio::test]
async fn forgot_password_delivery_failure_is_bad_gateway() {
    let state = test_app_state_with_mailer(Arc::new(MockMailer::failing_for(&[STAFF])));
    let (status, _) = forgot_password(State(state), Json(ForgotPasswordBody { email: STAFF.into() }))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn full_reset_flow() {
    let mailer = Arc::new(MockMailer::default());
    let state = test_app_state_with_mailer(mailer.clone());
    let (_, Json(old)) = login_with(&state, BOOTSTRAP).await.unwrap();

    forgot_password(State(state.clone()), Json(ForgotPasswordBody { email: STAFF.into() }))
        .await
        .unwrap();
    let Some(Notification::ResetCode { code, .. }) = mailer.sent().last().cloned() else {
        panic!("no reset code sent");
    };

    let verified = verify_reset_code(
        State(state.clone()),
        Json(VerifyCodeBody { email: STAFF.into(), code: code.clone() }),
    )
    .await
    .unwrap();
    assert_eq!(verified.0["valid"], true);

    let (_, status) = reset_password(
        State(state.clone()),
        CookieJar::new(),
        Json(ResetPasswordBody {
            email: STAFF.into(),
            code,
            new_password: "Reset!Pass1".into(),
            confirm_password: "Reset!Pass1".into(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.store.session(&old.token).await.unwrap().is_none());
    assert!(login_with(&state, "Reset!Pass1").await.is_ok());
}

#[tokio::test]
async fn wrong_code_is_unauthorized() {
    let state = test_app_state_with_mailer(Arc::new(MockMailer::default()));
    forgot_password(State(state.clone()), Json(ForgotPasswordBody { email: STAFF.into() }))
        .await
        .unwrap();
    let (status, _) = verify_reset_code(
        State(state.clone()),
        Json(VerifyCodeBody { email: STAFF.into(), code: "000000".into() }),
    )
    .await
    .unwrap_err();
    // Generated codes never start with 0.
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_is_throttled_per_address() {
    let mailer = Arc::new(MockMailer::default());
    let state = test_app_state_with_mailer(mailer.clone());
    for _ in 0..state.config.reset_request_limit {
        forgot_password(State(state.clone()), Json(ForgotPasswordBody { email: STAFF.into() }))
            .await
            .unwrap();
    }

    let (status, _) =
        forgot_password(State(state.clone()), Json(ForgotPasswordBody { email: " Office@Campus.EDU ".into() }))
            .await
            .unwrap_err();
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(mailer.sent().len(), state.config.reset_request_limit);
}
