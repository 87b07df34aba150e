//! # pmo-api
//!
//! HTTP surface of the PMO Dashboard auth subsystem: login, logout, the
//! current-user endpoint, and user permission administration. Handlers are
//! thin; the decisions live in `pmo-auth`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult, INVALID_CREDENTIALS_MESSAGE};
pub use extractors::{AppState, CurrentUser};
pub use routes::router;
