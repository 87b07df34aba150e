//! Auth error taxonomy
//!
//! Distinguishes the conditions the orchestrator recovers from internally
//! (directory unavailability, provisioning conflicts) from the terminal
//! conditions surfaced to callers. The HTTP mapping deliberately renders
//! `InvalidCredentials` and `AccountInactive` identically so a caller can
//! never enumerate accounts.

use thiserror::Error;

/// Errors produced by the authentication and authorization subsystem
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown username. Always reported identically.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Correct credentials, but the account status is not Active.
    #[error("account is not active")]
    AccountInactive,

    /// The directory endpoint is unreachable or erroring. Recovered by
    /// falling back to local verification; never a login failure by itself.
    #[error("directory service unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Two near-simultaneous first logins raced on provisioning. Recovered
    /// by re-reading the winning row.
    #[error("provisioning conflict for username {0}")]
    ProvisioningConflict(String),

    /// Session store infrastructure failure.
    #[error("session store failure: {0}")]
    SessionStore(String),

    /// User or department store infrastructure failure.
    #[error("store failure: {0}")]
    Store(String),

    /// The resolved permission set lacks the requirement. Distinct from
    /// authentication failure so the UI can render "access denied" rather
    /// than "please log in".
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl AuthError {
    /// HTTP status code this error maps to when it reaches a caller.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials | AuthError::AccountInactive => 401,
            AuthError::PermissionDenied(_) => 403,
            AuthError::DirectoryUnavailable(_)
            | AuthError::ProvisioningConflict(_)
            | AuthError::SessionStore(_)
            | AuthError::Store(_) => 500,
        }
    }
}
