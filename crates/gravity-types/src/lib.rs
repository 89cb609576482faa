//! # Gravity Types
//!
//! Shared data models and wire-protocol types for Gravity Gateway.

pub mod models;
pub mod protocol;

pub use models::{Account, AccountInput, AccountStatus, AccountType, AppConfig};
