//! Common error types for donorbase

use thiserror::Error;

/// Common result type for donorbase operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the pipeline engine and its front-ends
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No organization matched the query
    #[error("No organization found matching '{0}'")]
    NotFound(String),

    /// Query matched more than one organization; caller must disambiguate
    #[error("Query '{query}' matched {} organizations", .candidates.len())]
    AmbiguousMatch {
        query: String,
        candidates: Vec<String>,
    },

    /// Value is not a member of the stage set
    #[error("Invalid stage: '{0}'")]
    InvalidStage(String),

    /// Value does not parse as a calendar date
    #[error("Invalid date: '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Optimistic concurrency check failed; caller must re-fetch and retry
    #[error("Record '{0}' was modified concurrently")]
    ConcurrentModification(String),

    /// Underlying store is unreachable or timed out
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// Organization already exists (creation is an explicit one-time operation)
    #[error("Organization '{0}' already exists")]
    AlreadyExists(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors the caller may safely retry with backoff.
    ///
    /// Validation errors and genuine ambiguity are never retryable; the
    /// engine itself performs no automatic retry either way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConcurrentModification(_) | Error::StoreUnavailable(_)
        )
    }
}
