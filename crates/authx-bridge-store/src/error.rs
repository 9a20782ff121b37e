//! Error types for the authx-bridge-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! The one variant with cross-crate meaning is [`SchemaUnavailable`] —
//! the reconciliation engine treats it as the fatal
//! record-type-unavailable condition.
//!
//! [`SchemaUnavailable`]: StoreError::SchemaUnavailable

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The users schema could not be resolved — the deployment is
    /// misconfigured (missing table, empty column listing).
    #[error("user schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
