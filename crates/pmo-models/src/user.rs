//! User model
//!
//! Table: users

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pmo_core::types::{Id, Permission, Role, UserStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User account
///
/// Created by administrative CRUD or by the account provisioner when a
/// directory identity authenticates for the first time. Never hard-deleted
/// in the auth path; deactivation goes through `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,

    /// Login name, unique case-insensitively
    pub username: String,

    pub email: String,

    pub display_name: String,

    /// Stored one-way hash, never serialized in responses
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    pub status: UserStatus,

    pub department_id: Option<Id>,

    /// Preferred language
    pub language: Option<String>,

    /// Per-user permission overrides; present keys replace the role default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_permissions: Option<HashMap<Permission, bool>>,

    /// Set when the account came from the directory
    pub directory_sourced: bool,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Parameters for creating a user through administrative CRUD
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(length(min = 1, max = 255))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(max = 255))]
    pub display_name: String,

    #[validate(length(min = 10))]
    pub password: String,

    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub department_id: Option<Id>,
    pub language: Option<String>,
}

/// Insert record for an administratively created user, produced from a
/// validated [`NewUser`] once the password has been hashed
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub department_id: Option<Id>,
    pub language: Option<String>,
}

/// Parameters for creating a user from directory attributes
///
/// The password hash is random and never disclosed; these accounts only
/// ever authenticate through the directory.
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub department_id: Id,
}
