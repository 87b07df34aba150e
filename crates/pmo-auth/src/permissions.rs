//! Permission resolution
//!
//! The effective permission set for a user is the role's defaults with each
//! key present in the per-user override map replacing that key's value.
//! Lookups are deny-by-default: a permission not in the resolved set is
//! denied. Role-list checks and permission-flag checks are two distinct
//! gating modes; both are supported.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use pmo_core::error::AuthError;
use pmo_core::types::{Permission, Role};
use pmo_models::User;

/// The resolved set of permissions for one user
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    grants: HashMap<Permission, bool>,
}

impl PermissionSet {
    pub fn allows(&self, permission: Permission) -> bool {
        self.grants.get(&permission).copied().unwrap_or(false)
    }

    fn grant_all() -> Self {
        let mut grants = HashMap::new();
        for permission in Permission::ALL {
            grants.insert(permission, true);
        }
        Self { grants }
    }

    fn granting(permissions: &[Permission]) -> Self {
        let mut grants = HashMap::new();
        for &permission in permissions {
            grants.insert(permission, true);
        }
        Self { grants }
    }
}

/// Base permissions per role. Immutable application configuration.
static ROLE_DEFAULTS: Lazy<HashMap<Role, PermissionSet>> = Lazy::new(|| {
    use Permission::*;

    let mut table = HashMap::new();
    table.insert(Role::Administrator, PermissionSet::grant_all());
    table.insert(
        Role::MainPmo,
        PermissionSet::granting(&[
            CanApproveProject,
            CanViewReports,
            CanCreateGoal,
            CanCreateProject,
            CanEditProject,
            CanDeleteProject,
            CanCreateTask,
            CanAssignTask,
            CanManageBudgets,
            CanManageRisks,
            CanViewAuditLogs,
            CanManageDepartments,
        ]),
    );
    table.insert(
        Role::SubPmo,
        PermissionSet::granting(&[
            CanViewReports,
            CanCreateGoal,
            CanCreateProject,
            CanEditProject,
            CanCreateTask,
            CanAssignTask,
            CanManageRisks,
        ]),
    );
    table.insert(
        Role::DepartmentDirector,
        PermissionSet::granting(&[
            CanApproveProject,
            CanViewReports,
            CanCreateGoal,
            CanCreateTask,
            CanAssignTask,
            CanManageBudgets,
        ]),
    );
    table.insert(
        Role::ProjectManager,
        PermissionSet::granting(&[
            CanViewReports,
            CanEditProject,
            CanCreateTask,
            CanAssignTask,
            CanManageRisks,
        ]),
    );
    table.insert(
        Role::Executive,
        PermissionSet::granting(&[CanViewReports, CanViewAuditLogs]),
    );
    table.insert(Role::User, PermissionSet::default());
    table
});

/// The base permission set for a role.
pub fn role_defaults(role: Role) -> PermissionSet {
    ROLE_DEFAULTS
        .get(&role)
        .cloned()
        .unwrap_or_default()
}

/// Resolve role defaults with per-user overrides. A key present in the
/// override map replaces that key's value wholesale; absent keys fall
/// through to the role default.
pub fn resolve(role: Role, overrides: Option<&HashMap<Permission, bool>>) -> PermissionSet {
    let mut set = role_defaults(role);
    if let Some(overrides) = overrides {
        for (&permission, &granted) in overrides {
            set.grants.insert(permission, granted);
        }
    }
    set
}

/// Resolve the effective permission set for a user.
pub fn resolve_for(user: &User) -> PermissionSet {
    resolve(user.role, user.custom_permissions.as_ref())
}

/// Access gate, permission-flag mode: deny unless the user's resolved set
/// grants the permission.
pub fn require_permission(user: &User, permission: Permission) -> Result<(), AuthError> {
    if resolve_for(user).allows(permission) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied(permission.as_str().to_string()))
    }
}

/// Access gate, role-list mode: deny unless the user's literal role is in
/// the set. Overrides do not apply here.
pub fn require_role(user: &User, roles: &[Role]) -> Result<(), AuthError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied(format!(
            "requires one of: {}",
            roles
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
