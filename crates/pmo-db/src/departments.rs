//! Department storage
//!
//! Only the get-or-create path is needed by the auth subsystem, for landing
//! directory-provisioned accounts in the Hold department.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmo_auth::store::{DepartmentStore, StoreResult};
use pmo_models::{Department, NewDepartment};
use sqlx::{FromRow, PgPool};

use crate::map_sqlx_error;

const DEPARTMENT_COLUMNS: &str = "id, name, description, active, created_at, updated_at";

/// Department database row
#[derive(Debug, Clone, FromRow)]
pub struct DepartmentRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: row.id,
            name: row.name,
            description: row.description,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL department store
pub struct PgDepartmentStore {
    pool: PgPool,
}

impl PgDepartmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentStore for PgDepartmentStore {
    async fn get_or_create(&self, department: NewDepartment) -> StoreResult<Department> {
        // Insert-or-skip against the unique index on LOWER(name), then read
        // back whichever row won. Two concurrent callers converge on one row.
        let inserted = sqlx::query_as::<_, DepartmentRow>(&format!(
            r#"
            INSERT INTO departments (name, description, active, created_at, updated_at)
            VALUES ($1, $2, TRUE, NOW(), NOW())
            ON CONFLICT ((LOWER(name))) DO NOTHING
            RETURNING {DEPARTMENT_COLUMNS}
            "#
        ))
        .bind(&department.name)
        .bind(&department.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(created) = inserted {
            tracing::info!(name = %created.name, "department created");
            return Ok(created.into());
        }

        let existing = sqlx::query_as::<_, DepartmentRow>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE LOWER(name) = LOWER($1)"
        ))
        .bind(&department.name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(existing.into())
    }
}
