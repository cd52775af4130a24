//! Error types for the reputation client.

use thiserror::Error;

/// Result type alias for reputation operations.
pub type Result<T> = std::result::Result<T, ReputationError>;

/// Errors from talking to the reputation service.
///
/// These never escape the crate's public scan entry point: the client
/// downgrades every failure to an indeterminate verdict, because reputation
/// is defense-in-depth and must not take the pipeline down with it.
#[derive(Debug, Error)]
pub enum ReputationError {
    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a status the client does not handle.
    #[error("unexpected response status {status}")]
    UnexpectedStatus {
        /// HTTP status code returned by the service.
        status: u16,
    },

    /// The response body did not match the documented shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The staged file could not be read for upload.
    #[error("could not read staged file: {0}")]
    Io(#[from] std::io::Error),
}
