//! # Gravity Core
//!
//! The dispatch and rotation core of Gravity Gateway: account store, pool
//! selection, token lifecycle, model routing, dialect translation, and the
//! per-request proxy engine.
//!
//! Everything here is built through explicit composition (see
//! [`proxy::server::AppState`]) so tests can instantiate independent copies.

pub mod config;
pub mod error;
pub mod oauth;
pub mod pool;
pub mod proxy;
pub mod quota;
pub mod router;
pub mod store;
pub mod usage;
pub mod verification;

pub use error::{AppError, AppResult};
pub use store::Store;
