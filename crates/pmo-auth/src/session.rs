//! Server-side sessions
//!
//! Sessions are opaque random tokens mapped to a user id in durable storage.
//! Expiry slides forward by a fixed window on every successful load, capped
//! at a hard maximum lifetime from creation; an expired session fails `load`
//! and never resurrects.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pmo_core::config::SessionConfig;
use pmo_core::types::Id;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, StoreResult};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Session expired")]
    Expired,
    #[error("Session store failure: {0}")]
    Store(String),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => SessionError::NotFound,
            other => SessionError::Store(other.to_string()),
        }
    }
}

/// A server-side session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token
    pub id: String,
    /// Authenticated user
    pub user_id: Id,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Id, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: generate_session_id(),
            user_id,
            created_at: now,
            accessed_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Slide the expiry forward by `ttl`, never past `created_at + cap`.
    pub fn slide(&mut self, ttl: Duration, cap: Duration) {
        let now = Utc::now();
        let hard_limit = self.created_at + cap;
        self.expires_at = (now + ttl).min(hard_limit);
        self.accessed_at = now;
    }
}

/// Generate a secure random session ID
fn generate_session_id() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    const SESSION_ID_LENGTH: usize = 64;

    let mut rng = rand::rng();
    (0..SESSION_ID_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Session store trait for different backends
///
/// `get` returns the stored record even when expired; classification is the
/// manager's job so `Expired` and `NotFound` stay distinguishable.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> StoreResult<Option<Session>>;

    /// Insert or overwrite a session record.
    async fn put(&self, session: &Session) -> StoreResult<()>;

    async fn delete(&self, session_id: &str) -> StoreResult<()>;

    /// Remove expired sessions, returning how many were swept.
    async fn cleanup_expired(&self) -> StoreResult<u64>;
}

/// Creates, loads, and destroys sessions against a backing store
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    max_lifetime: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            ttl: Duration::hours(config.ttl_hours),
            max_lifetime: Duration::hours(config.max_lifetime_hours),
        }
    }

    /// Establish a session for a user. Concurrent sessions are permitted.
    pub async fn create(&self, user_id: Id) -> Result<Session, SessionError> {
        let session = Session::new(user_id, self.ttl);
        self.store.put(&session).await?;
        tracing::debug!(user_id, "session created");
        Ok(session)
    }

    /// Resolve a session id to its user, sliding the expiry window.
    ///
    /// An expired session is deleted on observation and reported as
    /// `Expired`; it can never be loaded again.
    pub async fn load(&self, session_id: &str) -> Result<Id, SessionError> {
        let Some(mut session) = self.store.get(session_id).await? else {
            return Err(SessionError::NotFound);
        };

        if session.is_expired() {
            self.store.delete(session_id).await.ok();
            return Err(SessionError::Expired);
        }

        session.slide(self.ttl, self.max_lifetime);
        self.store.put(&session).await?;
        Ok(session.user_id)
    }

    /// Destroy a session. Destroying an unknown session is not an error.
    pub async fn destroy(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.delete(session_id).await?;
        Ok(())
    }

    /// Sweep expired sessions from the store.
    pub async fn sweep(&self) -> Result<u64, SessionError> {
        Ok(self.store.cleanup_expired().await?)
    }
}

/// Cookie configuration for session transport
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "_pmo_session".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }
}

impl CookieConfig {
    /// Cookie settings derived from the session configuration: lifetime
    /// matches the sliding window, Secure per deployment.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.secure_cookies,
            max_age: Some(config.ttl_hours * 3600),
            ..Default::default()
        }
    }

    /// Build cookie header value
    pub fn build_cookie(&self, session_id: &str) -> String {
        let mut parts = vec![format!("{}={}", self.name, session_id)];

        parts.push(format!("Path={}", self.path));

        if self.secure {
            parts.push("Secure".to_string());
        }

        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        match self.same_site {
            SameSite::Strict => parts.push("SameSite=Strict".to_string()),
            SameSite::Lax => parts.push("SameSite=Lax".to_string()),
            SameSite::None => parts.push("SameSite=None".to_string()),
        }

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }

        parts.join("; ")
    }

    /// Build cookie header to clear the session
    pub fn build_clear_cookie(&self) -> String {
        format!("{}=; Path={}; Max-Age=0; HttpOnly", self.name, self.path)
    }
}

/// Extract session ID from a Cookie header
pub fn extract_session_id(cookie_header: &str, cookie_name: &str) -> Option<String> {
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((name, value)) = part.split_once('=') {
            if name.trim() == cookie_name {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySessionStore;

    fn manager() -> SessionManager {
        let config = SessionConfig {
            cookie_name: "_pmo_session".into(),
            ttl_hours: 24,
            max_lifetime_hours: 168,
            secure_cookies: false,
        };
        SessionManager::new(Arc::new(MemorySessionStore::new()), &config)
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let manager = manager();
        let session = manager.create(42).await.unwrap();
        assert_eq!(manager.load(&session.id).await.unwrap(), 42);
        // Loadable repeatedly until destroyed.
        assert_eq!(manager.load(&session.id).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_unknown_session_not_found() {
        let manager = manager();
        assert!(matches!(
            manager.load("nope").await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_destroy() {
        let manager = manager();
        let session = manager.create(1).await.unwrap();
        manager.destroy(&session.id).await.unwrap();
        assert!(matches!(
            manager.load(&session.id).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_never_resurrects() {
        let store = Arc::new(MemorySessionStore::new());
        let config = SessionConfig {
            cookie_name: "_pmo_session".into(),
            ttl_hours: 24,
            max_lifetime_hours: 168,
            secure_cookies: false,
        };
        let manager = SessionManager::new(store.clone(), &config);

        let mut session = Session::new(7, Duration::hours(24));
        session.expires_at = Utc::now() - Duration::seconds(1);
        store.put(&session).await.unwrap();

        assert!(matches!(
            manager.load(&session.id).await,
            Err(SessionError::Expired)
        ));
        // Deleted on observation; a second load is NotFound, never a user.
        assert!(matches!(
            manager.load(&session.id).await,
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn test_slide_respects_hard_cap() {
        let mut session = Session::new(1, Duration::hours(24));
        // Pretend the session is six and a half days old.
        session.created_at = Utc::now() - Duration::hours(156);
        session.slide(Duration::hours(24), Duration::hours(168));
        assert_eq!(session.expires_at, session.created_at + Duration::hours(168));
    }

    #[test]
    fn test_slide_extends_within_cap() {
        let mut session = Session::new(1, Duration::hours(24));
        let before = session.expires_at;
        session.slide(Duration::hours(24), Duration::hours(168));
        assert!(session.expires_at >= before);
    }

    #[test]
    fn test_session_id_shape() {
        let session = Session::new(1, Duration::hours(24));
        assert_eq!(session.id.len(), 64);
        assert!(session.id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_cookie_config() {
        let config = CookieConfig::default();
        let cookie = config.build_cookie("abc123");

        assert!(cookie.contains("_pmo_session=abc123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie() {
        let config = CookieConfig::default();
        assert!(config.build_clear_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_extract_session_id() {
        let cookie = "_pmo_session=abc123; other=value";
        assert_eq!(
            extract_session_id(cookie, "_pmo_session"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_session_id(cookie, "missing"), None);
    }
}
