//! Error types for the job controller.

use thiserror::Error;

/// Result type alias for gateway-core operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by the job lifecycle.
///
/// The HTTP layer collapses everything that is not a client error into a
/// single opaque failure string; the detail here goes to the process log
/// only.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The upload failed validation; the message is user-visible.
    #[error("{0}")]
    InvalidInput(String),

    /// Pre-scan policy refused a flagged upload (opt-in behavior).
    #[error("upload rejected by pre-scan policy: {0}")]
    PolicyRejected(String),

    /// Staging or cleanup I/O failed.
    #[error("staging failure: {0}")]
    Staging(#[from] std::io::Error),

    /// The sandboxed worker failed; carries the supervisor's failure mode.
    #[error(transparent)]
    Sandbox(#[from] flatpress_sandbox::SandboxError),

    /// The produced artifact never settled on disk.
    #[error("output handshake failed: {0}")]
    OutputUnsettled(String),

    /// The post-scan flagged the sanitized artifact; it has been destroyed.
    #[error("sanitized output failed the reputation gate: {0}")]
    OutputRejected(String),
}

impl GatewayError {
    /// True when the failure is the caller's fault (HTTP 400 class).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::PolicyRejected(_))
    }
}
