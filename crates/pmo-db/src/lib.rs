//! # pmo-db
//!
//! PostgreSQL storage for the PMO Dashboard backend, built on SQLx.
//!
//! Each store implements the corresponding trait from `pmo-auth`, so the
//! service layer is identical whether it runs against PostgreSQL or the
//! in-memory backends.
//!
//! ## Example
//!
//! ```ignore
//! use pmo_db::{Database, DatabaseConfig, PgUserStore};
//!
//! let db = Database::connect(&DatabaseConfig::with_url(url)).await?;
//! db.migrate().await?;
//! let users = PgUserStore::new(db.pool().clone());
//! ```

pub mod departments;
pub mod pool;
pub mod sessions;
pub mod users;

pub use departments::PgDepartmentStore;
pub use pool::{Database, DatabaseConfig};
pub use sessions::PgSessionStore;
pub use users::PgUserStore;

use pmo_auth::store::StoreError;

/// Map a SQLx error onto the storage error the service layer understands.
/// Unique violations become conflicts; everything else is a backend failure.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}
