//! API error handling
//!
//! Every error leaves the API as `{"message": "..."}` with the appropriate
//! status. Credential failures collapse onto one message so responses do not
//! reveal whether a username exists or an account is deactivated.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pmo_core::error::AuthError;
use serde::Serialize;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound { resource: &'static str, id: String },
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            // One message for both: which of the two failed stays private.
            AuthError::InvalidCredentials | AuthError::AccountInactive => {
                ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE)
            }
            AuthError::PermissionDenied(detail) => {
                ApiError::forbidden(format!("Missing permission: {}", detail))
            }
            AuthError::DirectoryUnavailable(cause) => {
                tracing::error!(%cause, "directory unavailable");
                ApiError::internal("Authentication service unavailable")
            }
            other => {
                tracing::error!(error = %other, "auth subsystem failure");
                ApiError::internal("Internal server error")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::NotFound { resource, id } => {
                format!("{} with id {} not found", resource, id)
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => msg,
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
