//! Axum extractors for API handlers

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use pmo_auth::session::{extract_session_id, CookieConfig};
use pmo_auth::AuthService;
use pmo_core::error::AuthError;
use pmo_models::User;
use std::sync::Arc;

use crate::error::ApiError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub cookies: CookieConfig,
}

/// The session id carried by the request's cookie, if any
pub(crate) fn session_id_from_parts(parts: &Parts, cookies: &CookieConfig) -> Option<String> {
    parts
        .headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| extract_session_id(header, &cookies.name))
}

/// Authenticated user extractor
///
/// Resolves the session cookie to an Active user. A session belonging to a
/// deactivated or deleted user is destroyed during extraction, so the
/// rejection also revokes.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let Some(session_id) = session_id_from_parts(parts, &app_state.cookies) else {
            return Err(ApiError::unauthorized("Not authenticated"));
        };

        match app_state.auth.current_user(&session_id).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(AuthError::InvalidCredentials | AuthError::AccountInactive) => {
                Err(ApiError::unauthorized("Not authenticated"))
            }
            Err(other) => Err(ApiError::from(other)),
        }
    }
}

impl std::ops::Deref for CurrentUser {
    type Target = User;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
