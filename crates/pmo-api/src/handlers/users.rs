//! User administration handlers

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use pmo_auth::permissions::require_permission;
use pmo_core::types::{Id, Permission, Role};
use pmo_models::NewUser;
use serde::Deserialize;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppState, CurrentUser};

/// Create a local user account
///
/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    actor: CurrentUser,
    Json(request): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&actor, Permission::CanManageUsers)?;

    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let created = state
        .auth
        .create_user(request)
        .await?
        .ok_or_else(|| ApiError::conflict("Username is already taken"))?;

    tracing::info!(actor_id = actor.id, user_id = created.id, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Role and permission-override assignment
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionsRequest {
    pub role: String,
    #[serde(default)]
    pub custom_permissions: Option<HashMap<String, bool>>,
}

/// Replace a user's role and permission overrides
///
/// PATCH /users/:id/permissions
pub async fn update_permissions(
    State(state): State<AppState>,
    actor: CurrentUser,
    Path(id): Path<Id>,
    Json(request): Json<UpdatePermissionsRequest>,
) -> ApiResult<impl IntoResponse> {
    require_permission(&actor, Permission::CanManageUsers)?;

    let role = Role::parse(&request.role)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown role: {}", request.role)))?;

    // The permission vocabulary is closed: unknown keys are rejected rather
    // than stored and silently ignored.
    let overrides = request
        .custom_permissions
        .map(|raw| {
            raw.into_iter()
                .map(|(key, granted)| {
                    Permission::parse(&key)
                        .map(|permission| (permission, granted))
                        .ok_or_else(|| {
                            ApiError::bad_request(format!("Unknown permission: {}", key))
                        })
                })
                .collect::<Result<HashMap<_, _>, _>>()
        })
        .transpose()?;

    let updated = state
        .auth
        .update_permissions(id, role, overrides)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    tracing::info!(
        actor_id = actor.id,
        user_id = updated.id,
        role = %updated.role,
        "permissions updated"
    );
    Ok(Json(updated))
}
