//! Router error types.

use thiserror::Error;

/// Error type for router setup and outbound calls.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
