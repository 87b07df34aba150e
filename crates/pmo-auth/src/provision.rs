//! Account provisioning
//!
//! Creates a local user record the first time a directory identity
//! authenticates successfully. Provisioned accounts land in the Hold
//! department with the base User role; neither is ever silently escalated.

use std::sync::Arc;

use pmo_core::error::AuthError;
use pmo_models::{NewDepartment, ProvisionedUser, User};

use crate::directory::DirectoryUser;
use crate::password;
use crate::store::{DepartmentStore, StoreError, UserStore};

/// Provisions local accounts from directory attributes
pub struct AccountProvisioner {
    users: Arc<dyn UserStore>,
    departments: Arc<dyn DepartmentStore>,
}

impl AccountProvisioner {
    pub fn new(users: Arc<dyn UserStore>, departments: Arc<dyn DepartmentStore>) -> Self {
        Self { users, departments }
    }

    /// Create the local user for a directory identity, or return the
    /// existing row if a concurrent first login won the insert.
    pub async fn provision(&self, directory_user: &DirectoryUser) -> Result<User, AuthError> {
        let hold = self
            .departments
            .get_or_create(NewDepartment::hold())
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        // The schema requires a password column; directory accounts get a
        // random hash that is never disclosed.
        let random = password::generate_password();
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&random))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let provisioned = ProvisionedUser {
            username: directory_user.username.clone(),
            email: directory_user.email.clone(),
            display_name: directory_user.display_name.clone(),
            password_hash,
            department_id: hold.id,
        };

        let user = match self.users.create_provisioned(provisioned).await {
            Ok(user) => user,
            // The insert raced a concurrent first login; the winner's row is
            // authoritative, so re-read it.
            Err(StoreError::Conflict(_)) => self
                .users
                .find_by_username(&directory_user.username)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?
                .ok_or_else(|| {
                    AuthError::ProvisioningConflict(directory_user.username.clone())
                })?,
            Err(e) => return Err(AuthError::Store(e.to_string())),
        };

        tracing::info!(
            user_id = user.id,
            username = %user.username,
            "provisioned directory user into Hold department"
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDepartmentStore, MemoryUserStore};
    use pmo_core::types::Role;
    use pmo_models::HOLD_DEPARTMENT;

    fn provisioner() -> (Arc<MemoryUserStore>, Arc<MemoryDepartmentStore>, AccountProvisioner) {
        let users = Arc::new(MemoryUserStore::new());
        let departments = Arc::new(MemoryDepartmentStore::new());
        let provisioner = AccountProvisioner::new(users.clone(), departments.clone());
        (users, departments, provisioner)
    }

    fn jdoe() -> DirectoryUser {
        DirectoryUser {
            username: "jdoe".to_string(),
            email: "jdoe@example.org".to_string(),
            display_name: "Jane Doe".to_string(),
        }
    }

    #[tokio::test]
    async fn test_provision_assigns_hold_and_user_role() {
        let (_, departments, provisioner) = provisioner();
        let user = provisioner.provision(&jdoe()).await.unwrap();

        assert_eq!(user.role, Role::User);
        assert!(user.is_active());
        assert!(user.directory_sourced);

        let hold = departments
            .get_or_create(NewDepartment::hold())
            .await
            .unwrap();
        assert_eq!(hold.name, HOLD_DEPARTMENT);
        assert_eq!(user.department_id, Some(hold.id));
    }

    #[tokio::test]
    async fn test_provision_twice_yields_one_account() {
        let (_, _, provisioner) = provisioner();
        let first = provisioner.provision(&jdoe()).await.unwrap();
        let second = provisioner.provision(&jdoe()).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_concurrent_provision_yields_one_account() {
        let (users, departments, _) = provisioner();
        let a = AccountProvisioner::new(users.clone(), departments.clone());
        let b = AccountProvisioner::new(users.clone(), departments.clone());

        let entry_a = jdoe();
        let entry_b = jdoe();
        let (ra, rb) = tokio::join!(a.provision(&entry_a), b.provision(&entry_b));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());
        assert_eq!(ra.id, rb.id);

        let found = users.find_by_username("jdoe").await.unwrap();
        assert!(found.is_some());
    }
}
