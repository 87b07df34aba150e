//! User storage
//!
//! PostgreSQL backend for the user store. Username lookups go through
//! `LOWER(username)`, matching the unique index, so every caller sees the
//! same case-insensitive namespace.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmo_auth::store::{StoreError, StoreResult, UserStore};
use pmo_core::types::{Id, Permission, Role, UserStatus};
use pmo_models::{CreateUser, ProvisionedUser, User};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::map_sqlx_error;

const USER_COLUMNS: &str = "id, username, email, display_name, password_hash, role, status, \
                            department_id, language, custom_permissions, directory_sourced, \
                            last_login_at, created_at, updated_at";

/// User database row
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub department_id: Option<i64>,
    pub language: Option<String>,
    pub custom_permissions: Option<Json<HashMap<Permission, bool>>>,
    pub directory_sourced: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> StoreResult<User> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| StoreError::Backend(format!("unknown role {:?}", self.role)))?;
        let status = UserStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown status {:?}", self.status)))?;

        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            password_hash: self.password_hash,
            role,
            status,
            department_id: self.department_id,
            language: self.language,
            custom_permissions: self.custom_permissions.map(|json| json.0),
            directory_sourced: self.directory_sourced,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// PostgreSQL user store
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_id(&self, id: Id) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn create_provisioned(&self, user: ProvisionedUser) -> StoreResult<User> {
        // The insert and the duplicate check are one statement: the unique
        // index on LOWER(username) arbitrates concurrent first logins, and
        // DO NOTHING turns the loser's insert into an empty result.
        let inserted = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (
                username, email, display_name, password_hash, role, status,
                department_id, directory_sourced, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW()
            )
            ON CONFLICT ((LOWER(username))) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(Role::User.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(user.department_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match inserted {
            Some(row) => row.into_user(),
            None => Err(StoreError::Conflict(user.username)),
        }
    }

    async fn create(&self, create: CreateUser) -> StoreResult<User> {
        // Same single-statement arbitration as create_provisioned, but a
        // taken username is an error here rather than a reusable row.
        let inserted = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (
                username, email, display_name, password_hash, role, status,
                department_id, language, directory_sourced, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, FALSE, NOW(), NOW()
            )
            ON CONFLICT ((LOWER(username))) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&create.username)
        .bind(&create.email)
        .bind(&create.display_name)
        .bind(&create.password_hash)
        .bind(create.role.as_str())
        .bind(create.status.as_str())
        .bind(create.department_id)
        .bind(&create.language)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match inserted {
            Some(row) => row.into_user(),
            None => Err(StoreError::Conflict(create.username)),
        }
    }

    async fn update_permissions(
        &self,
        id: Id,
        role: Role,
        custom_permissions: Option<HashMap<Permission, bool>>,
    ) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET role = $1, custom_permissions = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(role.as_str())
        .bind(custom_permissions.map(Json))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        row.into_user()
    }

    async fn record_login(&self, id: Id) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
