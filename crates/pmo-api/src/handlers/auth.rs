//! Login, logout, and current-user handlers

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use pmo_auth::session::extract_session_id;
use pmo_auth::LoginRequest;

use crate::error::ApiResult;
use crate::extractors::{AppState, CurrentUser};

/// Authenticate and establish a session
///
/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let success = state.auth.login(request).await?;
    let cookie = state.cookies.build_cookie(&success.session.id);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(success.user),
    ))
}

/// Destroy the current session
///
/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(session_id) = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| extract_session_id(header, &state.cookies.name))
    {
        state.auth.logout(&session_id).await?;
    }

    // Logging out without a session is a no-op, not an error.
    let clear = state.cookies.build_clear_cookie();
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear)],
        Json(serde_json::json!({ "message": "Logged out" })),
    ))
}

/// The authenticated user for the current session
///
/// GET /user
pub async fn current_user(user: CurrentUser) -> impl IntoResponse {
    Json(user.0)
}
