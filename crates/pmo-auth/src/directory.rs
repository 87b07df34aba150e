//! Directory client
//!
//! Binds to an external directory service and searches for a user record by
//! username. The three outcomes are typed, not sniffed from error strings:
//! a resolvable match, a credential rejection, or an unreachable endpoint.
//! Unreachability is a fall-back signal, never a login failure by itself.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{ldap_escape, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use pmo_core::config::DirectoryConfig;

/// Attributes returned for a matched directory identity
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

/// Outcome of a directory authentication attempt
#[derive(Debug)]
pub enum DirectoryOutcome {
    /// Successful bind with a resolvable user entry
    Matched(DirectoryUser),
    /// Bind rejected or no entry found: the credentials are simply wrong
    NotFound,
    /// The endpoint itself is unreachable or erroring; fall back to local
    Unavailable(String),
}

/// A directory that can authenticate users by bind-and-search
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> DirectoryOutcome;
}

/// LDAP-backed directory client
pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn bind_and_search(&self, username: &str, password: &str) -> DirectoryOutcome {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout());
        let (conn, mut ldap) = match LdapConnAsync::with_settings(settings, &self.config.url).await
        {
            Ok(pair) => pair,
            Err(e) => return DirectoryOutcome::Unavailable(e.to_string()),
        };
        ldap3::drive!(conn);

        // Service bind: a rejection here is a configuration or endpoint
        // problem, not a statement about the user's credentials.
        let bind = ldap
            .with_timeout(self.timeout())
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .and_then(|r| r.success());
        if let Err(e) = bind {
            return DirectoryOutcome::Unavailable(format!("service bind failed: {}", e));
        }

        let filter = self
            .config
            .search_filter
            .replace("{login}", &ldap_escape(username));
        let attrs = vec![
            self.config.attr_username.as_str(),
            self.config.attr_email.as_str(),
            self.config.attr_display_name.as_str(),
        ];

        let search = ldap
            .with_timeout(self.timeout())
            .search(&self.config.search_base, Scope::Subtree, &filter, attrs)
            .await
            .and_then(|r| r.success());
        let entries = match search {
            Ok((entries, _)) => entries,
            Err(e) => return DirectoryOutcome::Unavailable(format!("search failed: {}", e)),
        };

        let Some(entry) = entries.into_iter().next() else {
            return DirectoryOutcome::NotFound;
        };
        let entry = SearchEntry::construct(entry);

        // Bind as the found entry to validate the user's password.
        let user_bind = ldap
            .with_timeout(self.timeout())
            .simple_bind(&entry.dn, password)
            .await
            .and_then(|r| r.success());
        let outcome = match user_bind {
            Ok(_) => DirectoryOutcome::Matched(self.entry_to_user(username, &entry)),
            Err(e) => classify_bind_error(e),
        };

        ldap.unbind().await.ok();
        outcome
    }

    fn entry_to_user(&self, requested: &str, entry: &SearchEntry) -> DirectoryUser {
        let attr = |name: &str| {
            entry
                .attrs
                .get(name)
                .and_then(|values| values.first())
                .cloned()
        };

        DirectoryUser {
            username: attr(&self.config.attr_username).unwrap_or_else(|| requested.to_string()),
            email: attr(&self.config.attr_email).unwrap_or_default(),
            display_name: attr(&self.config.attr_display_name)
                .unwrap_or_else(|| requested.to_string()),
        }
    }
}

/// Classify a user-bind failure by its typed error, not its message.
/// Result code 49 (invalidCredentials) means the password is wrong; anything
/// else is the endpoint erroring at the protocol level.
fn classify_bind_error(e: LdapError) -> DirectoryOutcome {
    const INVALID_CREDENTIALS: u32 = 49;
    match e {
        LdapError::LdapResult { result } if result.rc == INVALID_CREDENTIALS => {
            DirectoryOutcome::NotFound
        }
        other => DirectoryOutcome::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl DirectoryService for LdapDirectory {
    async fn authenticate(&self, username: &str, password: &str) -> DirectoryOutcome {
        // An empty password would be an anonymous bind, which some servers
        // accept. That is never a user authentication.
        if username.is_empty() || password.is_empty() {
            return DirectoryOutcome::NotFound;
        }
        self.bind_and_search(username, password).await
    }
}

/// In-memory directory for development and testing
pub struct StaticDirectory {
    users: std::collections::HashMap<String, (String, DirectoryUser)>,
    available: std::sync::atomic::AtomicBool,
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self {
            users: std::collections::HashMap::new(),
            available: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn with_user(
        mut self,
        username: &str,
        password: &str,
        email: &str,
        display_name: &str,
    ) -> Self {
        self.users.insert(
            username.to_lowercase(),
            (
                password.to_string(),
                DirectoryUser {
                    username: username.to_string(),
                    email: email.to_string(),
                    display_name: display_name.to_string(),
                },
            ),
        );
        self
    }

    /// Simulate the endpoint going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available
            .store(available, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectoryService for StaticDirectory {
    async fn authenticate(&self, username: &str, password: &str) -> DirectoryOutcome {
        if !self.available.load(std::sync::atomic::Ordering::SeqCst) {
            return DirectoryOutcome::Unavailable("connection refused".to_string());
        }
        if username.is_empty() || password.is_empty() {
            return DirectoryOutcome::NotFound;
        }
        match self.users.get(&username.to_lowercase()) {
            Some((stored, user)) if stored == password => {
                DirectoryOutcome::Matched(user.clone())
            }
            _ => DirectoryOutcome::NotFound,
        }
    }
}
