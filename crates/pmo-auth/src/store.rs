//! Storage seams for the auth subsystem
//!
//! The orchestrator and provisioner talk to users and departments through
//! these traits; `pmo-db` provides the PostgreSQL backends and
//! [`crate::memory`] the in-memory ones for development and testing.

use std::collections::HashMap;

use async_trait::async_trait;
use pmo_core::types::{Id, Permission, Role};
use pmo_models::{CreateUser, Department, NewDepartment, ProvisionedUser, User};
use thiserror::Error;

/// Errors from a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up by username, case-insensitively.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: Id) -> StoreResult<Option<User>>;

    /// Insert a directory-provisioned user with `role = User` and
    /// `status = Active`. Must be a single atomic check-then-act keyed on
    /// the case-insensitive username: a concurrent duplicate insert resolves
    /// to the existing row instead of erroring or creating two accounts.
    async fn create_provisioned(&self, user: ProvisionedUser) -> StoreResult<User>;

    /// Insert an administratively created user. A taken username, compared
    /// case-insensitively, is a [`StoreError::Conflict`].
    async fn create(&self, user: CreateUser) -> StoreResult<User>;

    /// Replace the user's role and custom-permission overrides.
    async fn update_permissions(
        &self,
        id: Id,
        role: Role,
        custom_permissions: Option<HashMap<Permission, bool>>,
    ) -> StoreResult<User>;

    /// Stamp `last_login_at` after a successful login.
    async fn record_login(&self, id: Id) -> StoreResult<()>;
}

/// Department persistence
#[async_trait]
pub trait DepartmentStore: Send + Sync {
    /// Get-or-create by case-insensitive name, atomically. Two concurrent
    /// callers both receive the same row.
    async fn get_or_create(&self, department: NewDepartment) -> StoreResult<Department>;
}
