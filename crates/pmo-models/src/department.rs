//! Department model
//!
//! Table: departments

use chrono::{DateTime, Utc};
use pmo_core::types::Id;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Name of the landing department for newly provisioned directory users.
/// Lazily created on first need; looked up case-insensitively.
pub const HOLD_DEPARTMENT: &str = "Hold";

/// Department
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Id,

    /// Unique case-insensitively
    pub name: String,

    pub description: Option<String>,

    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a department
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub description: Option<String>,
}

impl NewDepartment {
    /// The Hold department as created on first need.
    pub fn hold() -> Self {
        Self {
            name: HOLD_DEPARTMENT.to_string(),
            description: Some("Landing department for directory-provisioned accounts".to_string()),
        }
    }
}
