// PassGuard — Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error("{0}")]
    Other(String),
}
