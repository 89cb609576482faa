//! Unified error types for Gravity Core.

use thiserror::Error;

/// Main error type for all gateway operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Database operation failed (SQLite).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Network request failed (HTTP client).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// OAuth token refresh was rejected by the upstream endpoint.
    #[error("token refresh failed: HTTP {status}: {body}")]
    Auth { status: u16, body: String },

    /// The selector could not produce any account.
    #[error("no active accounts available")]
    NoAccountsAvailable,

    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// The generative upstream returned a non-200 status.
    #[error("upstream error: HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Result type alias for gateway operations.
pub type AppResult<T> = Result<T, AppError>;
