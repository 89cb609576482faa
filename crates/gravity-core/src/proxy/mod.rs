//! The proxy engine: upstream client, dialect translation, per-request
//! orchestration, shared state, and background housekeeping.

pub mod handlers;
pub mod mappers;
pub mod server;
pub mod sweeper;
pub mod upstream;
