//! In-memory store backends (for development/testing)
//!
//! The PostgreSQL backends live in `pmo-db`; these implement the same
//! traits behind process-local locks and honor the same case-insensitivity
//! and idempotency contracts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use pmo_core::types::{normalize_username, Id, Permission, Role, UserStatus};
use pmo_models::{CreateUser, Department, NewDepartment, ProvisionedUser, User};

use crate::session::{Session, SessionStore};
use crate::store::{DepartmentStore, StoreError, StoreResult, UserStore};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory user store
pub struct MemoryUserStore {
    users: RwLock<HashMap<Id, User>>,
    next_id: AtomicI64,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed a local user directly. Panics on a duplicate username; seeding
    /// happens at startup or in tests, never concurrently with requests.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &self,
        username: &str,
        email: &str,
        display_name: &str,
        password_hash: &str,
        role: Role,
        status: UserStatus,
        department_id: Option<Id>,
    ) -> User {
        let mut users = self.users.write().expect("lock poisoned");
        let key = normalize_username(username);
        assert!(
            !users.values().any(|u| normalize_username(&u.username) == key),
            "duplicate username {:?}",
            username
        );

        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: username.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            password_hash: password_hash.to_string(),
            role,
            status,
            department_id,
            language: None,
            custom_permissions: None,
            directory_sourced: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        user
    }

    /// Flip a seeded user's status. Panics on an unknown id.
    pub fn set_status(&self, id: Id, status: UserStatus) {
        let mut users = self.users.write().expect("lock poisoned");
        let user = users.get_mut(&id).expect("unknown user id");
        user.status = status;
        user.updated_at = Utc::now();
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let key = normalize_username(username);
        Ok(users
            .values()
            .find(|u| normalize_username(&u.username) == key)
            .cloned())
    }

    async fn find_by_id(&self, id: Id) -> StoreResult<Option<User>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn create_provisioned(&self, provisioned: ProvisionedUser) -> StoreResult<User> {
        // Single check-then-act under the write lock: a concurrent duplicate
        // resolves to the winner's row.
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let key = normalize_username(&provisioned.username);
        if let Some(existing) = users
            .values()
            .find(|u| normalize_username(&u.username) == key)
        {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: provisioned.username,
            email: provisioned.email,
            display_name: provisioned.display_name,
            password_hash: provisioned.password_hash,
            role: Role::User,
            status: UserStatus::Active,
            department_id: Some(provisioned.department_id),
            language: None,
            custom_permissions: None,
            directory_sourced: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create(&self, create: CreateUser) -> StoreResult<User> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let key = normalize_username(&create.username);
        if users
            .values()
            .any(|u| normalize_username(&u.username) == key)
        {
            return Err(StoreError::Conflict(create.username));
        }

        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: create.username,
            email: create.email,
            display_name: create.display_name,
            password_hash: create.password_hash,
            role: create.role,
            status: create.status,
            department_id: create.department_id,
            language: create.language,
            custom_permissions: None,
            directory_sourced: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_permissions(
        &self,
        id: Id,
        role: Role,
        custom_permissions: Option<HashMap<Permission, bool>>,
    ) -> StoreResult<User> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.role = role;
        user.custom_permissions = custom_permissions;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn record_login(&self, id: Id) -> StoreResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.last_login_at = Some(Utc::now());
        Ok(())
    }
}

/// In-memory department store
pub struct MemoryDepartmentStore {
    departments: RwLock<HashMap<String, Department>>,
    next_id: AtomicI64,
}

impl Default for MemoryDepartmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDepartmentStore {
    pub fn new() -> Self {
        Self {
            departments: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl DepartmentStore for MemoryDepartmentStore {
    async fn get_or_create(&self, department: NewDepartment) -> StoreResult<Department> {
        let mut departments = self.departments.write().map_err(|_| poisoned())?;
        let key = department.name.trim().to_lowercase();
        if let Some(existing) = departments.get(&key) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let created = Department {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: department.name,
            description: department.description,
            active: true,
            created_at: now,
            updated_at: now,
        };
        departments.insert(key, created.clone());
        Ok(created)
    }
}

/// In-memory session store
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> StoreResult<Option<Session>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn put(&self, session: &Session) -> StoreResult<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> StoreResult<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(session_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_username_lookup_is_case_insensitive() {
        let store = MemoryUserStore::new();
        store.insert(
            "JDoe",
            "jdoe@example.org",
            "Jane Doe",
            "hash",
            Role::User,
            UserStatus::Active,
            None,
        );

        let found = store.find_by_username("jdoe").await.unwrap();
        assert!(found.is_some());
        let found = store.find_by_username("JDOE").await.unwrap();
        assert_eq!(found.unwrap().username, "JDoe");
    }

    #[tokio::test]
    async fn test_create_provisioned_is_idempotent() {
        let store = MemoryUserStore::new();
        let provisioned = ProvisionedUser {
            username: "jdoe".to_string(),
            email: "jdoe@example.org".to_string(),
            display_name: "Jane Doe".to_string(),
            password_hash: "hash".to_string(),
            department_id: 1,
        };

        let first = store.create_provisioned(provisioned.clone()).await.unwrap();
        let second = store.create_provisioned(provisioned).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::User);
        assert!(first.directory_sourced);
    }

    #[tokio::test]
    async fn test_create_rejects_taken_username_case_insensitively() {
        let store = MemoryUserStore::new();
        let create = CreateUser {
            username: "JDoe".to_string(),
            email: "jdoe@example.org".to_string(),
            display_name: "Jane Doe".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            status: UserStatus::Active,
            department_id: None,
            language: None,
        };

        store.create(create.clone()).await.unwrap();
        let err = store
            .create(CreateUser {
                username: "jdoe".to_string(),
                ..create
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_department_get_or_create_case_insensitive() {
        let store = MemoryDepartmentStore::new();
        let first = store.get_or_create(NewDepartment::hold()).await.unwrap();
        let second = store
            .get_or_create(NewDepartment {
                name: "hold".to_string(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "Hold");
    }

    #[tokio::test]
    async fn test_session_cleanup() {
        let store = MemorySessionStore::new();
        let live = Session::new(1, chrono::Duration::hours(1));
        let mut dead = Session::new(2, chrono::Duration::hours(1));
        dead.expires_at = Utc::now() - chrono::Duration::seconds(1);

        store.put(&live).await.unwrap();
        store.put(&dead).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.get(&live.id).await.unwrap().is_some());
        assert!(store.get(&dead.id).await.unwrap().is_none());
    }
}
