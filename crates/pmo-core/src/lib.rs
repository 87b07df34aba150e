//! # pmo-core
//!
//! Core types, configuration, and errors for the PMO Dashboard backend.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - The auth error taxonomy
//! - Role, status, and permission enumerations
//! - Application configuration loaded from the environment

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ConfigError, DirectoryConfig, ServerConfig, SessionConfig};
pub use error::AuthError;
pub use types::{Id, Permission, Role, UserStatus};
