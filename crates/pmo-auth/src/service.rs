//! Auth orchestrator
//!
//! Sequences the directory and local strategies into a single login
//! decision. The whole flow is one async function returning one terminal
//! value: the directory attempt fully completes (or times out) before any
//! local attempt begins, and the caller writes exactly one response from
//! the returned `Result`. There is no second path that could respond twice.

use std::sync::Arc;
use std::time::Duration;

use pmo_core::error::AuthError;
use pmo_core::types::{Id, Permission, Role};
use pmo_models::{CreateUser, NewUser, User};
use serde::Deserialize;

use crate::directory::{DirectoryOutcome, DirectoryService};
use crate::password;
use crate::provision::AccountProvisioner;
use crate::session::{Session, SessionError, SessionManager};
use crate::store::{DepartmentStore, StoreError, UserStore};

/// Explicit strategy selection, bypassing the fallback chain. Used by
/// automated tests and administrative break-glass access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Local,
    Directory,
}

/// A login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

/// A successful login: the authenticated user and their new session
#[derive(Debug)]
pub struct LoginSuccess {
    pub user: User,
    pub session: Session,
}

/// Well-formed stored hash that matches no password. Verified when a local
/// lookup misses so an unknown username costs the same key derivation as a
/// known one and response timing does not reveal account existence.
const UNMATCHABLE_STORED_HASH: &str = "00000000000000000000000000000000.\
     0000000000000000000000000000000000000000000000000000000000000000";

/// Result of the directory leg of the chain
enum DirectoryAttempt {
    Success(User),
    NoMatch,
    Unavailable(String),
}

/// Owns the auth subsystem's collaborators; constructed once at process
/// start and injected wherever a login decision or session lookup is made.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    provisioner: AccountProvisioner,
    directory: Option<Arc<dyn DirectoryService>>,
    sessions: SessionManager,
    login_deadline: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        departments: Arc<dyn DepartmentStore>,
        directory: Option<Arc<dyn DirectoryService>>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            provisioner: AccountProvisioner::new(users.clone(), departments),
            users,
            directory,
            sessions,
            login_deadline: Duration::from_secs(30),
        }
    }

    /// Overall deadline for a login request: directory attempt plus local
    /// verification must finish inside it or the login fails closed.
    pub fn with_login_deadline(mut self, deadline: Duration) -> Self {
        self.login_deadline = deadline;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Attempt a login. Exactly one terminal value per call.
    ///
    /// The deadline covers only the authentication legs. The session is
    /// created after the timed section completes, so an elapsed deadline
    /// can never leave a partially established session behind.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginSuccess, AuthError> {
        let user = match tokio::time::timeout(self.login_deadline, self.authenticate(request))
            .await
        {
            Ok(outcome) => outcome?,
            Err(_) => {
                tracing::warn!("login exceeded overall deadline, failing closed");
                return Err(AuthError::InvalidCredentials);
            }
        };
        self.establish(user).await
    }

    async fn authenticate(&self, request: LoginRequest) -> Result<User, AuthError> {
        let username = request.username.trim();

        match request.strategy {
            Some(Strategy::Local) => self.attempt_local(username, &request.password).await,
            Some(Strategy::Directory) => {
                match self.attempt_directory(username, &request.password).await? {
                    DirectoryAttempt::Success(user) => Ok(user),
                    DirectoryAttempt::NoMatch => Err(AuthError::InvalidCredentials),
                    // The fallback is disabled by the caller's choice, so
                    // unavailability surfaces as the infrastructure failure
                    // it is.
                    DirectoryAttempt::Unavailable(cause) => {
                        Err(AuthError::DirectoryUnavailable(cause))
                    }
                }
            }
            None => {
                match self.attempt_directory(username, &request.password).await? {
                    DirectoryAttempt::Success(user) => return Ok(user),
                    DirectoryAttempt::NoMatch => {
                        tracing::debug!(username, "no directory match, trying local");
                    }
                    DirectoryAttempt::Unavailable(cause) => {
                        tracing::warn!(username, %cause, "directory unavailable, trying local");
                    }
                }
                self.attempt_local(username, &request.password).await
            }
        }
    }

    /// Directory leg. A match for an unknown username triggers provisioning;
    /// a match for a known account requires that account to be Active.
    async fn attempt_directory(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryAttempt, AuthError> {
        let Some(directory) = &self.directory else {
            return Ok(DirectoryAttempt::Unavailable(
                "directory strategy not configured".to_string(),
            ));
        };

        match directory.authenticate(username, password).await {
            DirectoryOutcome::Matched(directory_user) => {
                let user = match self
                    .users
                    .find_by_username(username)
                    .await
                    .map_err(store_err)?
                {
                    Some(existing) => existing,
                    None => self.provisioner.provision(&directory_user).await?,
                };
                if !user.is_active() {
                    // Correct directory credentials, deactivated account:
                    // terminal, no fallback.
                    return Err(AuthError::AccountInactive);
                }
                Ok(DirectoryAttempt::Success(user))
            }
            DirectoryOutcome::NotFound => Ok(DirectoryAttempt::NoMatch),
            DirectoryOutcome::Unavailable(cause) => Ok(DirectoryAttempt::Unavailable(cause)),
        }
    }

    /// Local leg: password match against the stored hash AND Active status.
    async fn attempt_local(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self
            .users
            .find_by_username(username)
            .await
            .map_err(store_err)?
        else {
            let supplied = password.to_string();
            tokio::task::spawn_blocking(move || {
                password::verify_password(&supplied, UNMATCHABLE_STORED_HASH)
            })
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
            return Err(AuthError::InvalidCredentials);
        };

        // Key derivation is CPU-bound; keep it off the request task.
        let stored = user.password_hash.clone();
        let supplied = password.to_string();
        let matched =
            tokio::task::spawn_blocking(move || password::verify_password(&supplied, &stored))
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;

        if !matched {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }
        Ok(user)
    }

    async fn establish(&self, user: User) -> Result<LoginSuccess, AuthError> {
        let session = self
            .sessions
            .create(user.id)
            .await
            .map_err(session_err)?;

        if let Err(e) = self.users.record_login(user.id).await {
            tracing::warn!(user_id = user.id, error = %e, "failed to stamp last login");
        }

        tracing::info!(user_id = user.id, username = %user.username, "login succeeded");
        Ok(LoginSuccess { user, session })
    }

    /// Resolve the current session to its user. An inactive or deleted user
    /// never retains a valid session: the session is destroyed on sight.
    pub async fn current_user(&self, session_id: &str) -> Result<User, AuthError> {
        let user_id = self.sessions.load(session_id).await.map_err(|e| match e {
            SessionError::NotFound | SessionError::Expired => AuthError::InvalidCredentials,
            SessionError::Store(m) => AuthError::SessionStore(m),
        })?;

        let user = self.users.find_by_id(user_id).await.map_err(store_err)?;
        let Some(user) = user else {
            self.sessions.destroy(session_id).await.ok();
            return Err(AuthError::InvalidCredentials);
        };
        if !user.is_active() {
            self.sessions.destroy(session_id).await.ok();
            return Err(AuthError::AccountInactive);
        }
        Ok(user)
    }

    /// Destroy the current session.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.destroy(session_id).await.map_err(session_err)
    }

    /// Create a local account administratively. Returns `None` when the
    /// username is already taken, case-insensitively.
    pub async fn create_user(&self, new_user: NewUser) -> Result<Option<User>, AuthError> {
        let plaintext = new_user.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let record = CreateUser {
            username: new_user.username.trim().to_string(),
            email: new_user.email,
            display_name: new_user.display_name,
            password_hash,
            role: new_user.role.unwrap_or_default(),
            status: new_user.status.unwrap_or_default(),
            department_id: new_user.department_id,
            language: new_user.language,
        };

        match self.users.create(record).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "user created");
                Ok(Some(user))
            }
            Err(StoreError::Conflict(_)) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    /// Replace a user's role and permission overrides. Returns `None` when
    /// the user does not exist.
    pub async fn update_permissions(
        &self,
        id: Id,
        role: Role,
        custom_permissions: Option<std::collections::HashMap<Permission, bool>>,
    ) -> Result<Option<User>, AuthError> {
        match self
            .users
            .update_permissions(id, role, custom_permissions)
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    pub async fn find_user(&self, id: Id) -> Result<Option<User>, AuthError> {
        self.users.find_by_id(id).await.map_err(store_err)
    }
}

fn store_err(e: StoreError) -> AuthError {
    AuthError::Store(e.to_string())
}

fn session_err(e: SessionError) -> AuthError {
    AuthError::SessionStore(e.to_string())
}
