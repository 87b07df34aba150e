//! Common types used throughout the PMO Dashboard backend

use serde::{Deserialize, Serialize};

/// Primary key type
pub type Id = i64;

/// User roles
///
/// The fixed role enumeration that drives default permission assignment.
/// Wire names match the dashboard's role identifiers exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Administrator,
    #[serde(rename = "MainPMO")]
    MainPmo,
    #[serde(rename = "SubPMO")]
    SubPmo,
    DepartmentDirector,
    ProjectManager,
    Executive,
    #[default]
    User,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Administrator,
        Role::MainPmo,
        Role::SubPmo,
        Role::DepartmentDirector,
        Role::ProjectManager,
        Role::Executive,
        Role::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::MainPmo => "MainPMO",
            Role::SubPmo => "SubPMO",
            Role::DepartmentDirector => "DepartmentDirector",
            Role::ProjectManager => "ProjectManager",
            Role::Executive => "Executive",
            Role::User => "User",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<UserStatus> {
        match s {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

/// Named permissions gating privileged operations
///
/// A closed enumeration: unknown permission names are a validation-time
/// error, never a silent miss. Wire names are camelCase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    CanApproveProject,
    CanViewReports,
    CanManageUsers,
    CanCreateGoal,
    CanAccessAdminSettings,
    CanCreateProject,
    CanEditProject,
    CanDeleteProject,
    CanCreateTask,
    CanAssignTask,
    CanManageBudgets,
    CanManageRisks,
    CanViewAuditLogs,
    CanManageDepartments,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::CanApproveProject,
        Permission::CanViewReports,
        Permission::CanManageUsers,
        Permission::CanCreateGoal,
        Permission::CanAccessAdminSettings,
        Permission::CanCreateProject,
        Permission::CanEditProject,
        Permission::CanDeleteProject,
        Permission::CanCreateTask,
        Permission::CanAssignTask,
        Permission::CanManageBudgets,
        Permission::CanManageRisks,
        Permission::CanViewAuditLogs,
        Permission::CanManageDepartments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanApproveProject => "canApproveProject",
            Permission::CanViewReports => "canViewReports",
            Permission::CanManageUsers => "canManageUsers",
            Permission::CanCreateGoal => "canCreateGoal",
            Permission::CanAccessAdminSettings => "canAccessAdminSettings",
            Permission::CanCreateProject => "canCreateProject",
            Permission::CanEditProject => "canEditProject",
            Permission::CanDeleteProject => "canDeleteProject",
            Permission::CanCreateTask => "canCreateTask",
            Permission::CanAssignTask => "canAssignTask",
            Permission::CanManageBudgets => "canManageBudgets",
            Permission::CanManageRisks => "canManageRisks",
            Permission::CanViewAuditLogs => "canViewAuditLogs",
            Permission::CanManageDepartments => "canManageDepartments",
        }
    }

    pub fn parse(s: &str) -> Option<Permission> {
        Permission::ALL.iter().copied().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a username for case-insensitive comparison
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
