//! # pmo-models
//!
//! Domain models for the PMO Dashboard backend.

pub mod department;
pub mod user;

pub use department::{Department, NewDepartment, HOLD_DEPARTMENT};
pub use user::{CreateUser, NewUser, ProvisionedUser, User};
