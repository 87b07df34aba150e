//! # pmo-auth
//!
//! Authentication and authorization for the PMO Dashboard backend.
//!
//! ## Features
//!
//! - Dual-strategy login: directory bind with local-password fallback
//! - Server-side sessions with a sliding expiry window
//! - Automatic provisioning of first-time directory users
//! - Role defaults plus per-user overrides for permission resolution

pub mod directory;
pub mod memory;
pub mod password;
pub mod permissions;
pub mod provision;
pub mod service;
pub mod session;
pub mod store;

pub use directory::{DirectoryOutcome, DirectoryService, DirectoryUser, LdapDirectory, StaticDirectory};
pub use memory::{MemoryDepartmentStore, MemorySessionStore, MemoryUserStore};
pub use permissions::{resolve, role_defaults, PermissionSet};
pub use provision::AccountProvisioner;
pub use service::{AuthService, LoginRequest, LoginSuccess, Strategy};
pub use session::{
    extract_session_id, CookieConfig, SameSite, Session, SessionError, SessionManager, SessionStore,
};
pub use store::{DepartmentStore, StoreError, StoreResult, UserStore};
