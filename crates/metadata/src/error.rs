//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Map a UNIQUE violation to `AlreadyExists`, anything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: impl FnOnce() -> String) -> MetadataError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            MetadataError::AlreadyExists(what())
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            MetadataError::Constraint(db_err.message().to_string())
        }
        other => MetadataError::Database(other),
    }
}
