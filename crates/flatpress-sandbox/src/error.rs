//! Error types for sandbox supervision.

use thiserror::Error;

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Failure modes of a sandboxed worker run.
///
/// Every variant maps to a failed job. None of them leaks worker state: the
/// supervisor destroys the container on every exit path before any of these
/// reach the caller.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The worker image could not be built.
    #[error("worker image build failed: {detail}")]
    Build {
        /// Tail of the build output.
        detail: String,
    },

    /// The container runtime refused to launch the worker.
    #[error("worker launch failed: {detail}")]
    Launch {
        /// Tail of the runtime's error output.
        detail: String,
    },

    /// The worker ran and exited nonzero.
    #[error("worker exited with status {code}")]
    WorkerFailed {
        /// The worker's exit code.
        code: i64,
        /// Captured worker output for the job log.
        logs: String,
    },

    /// The worker exceeded its wall-clock ceiling and was destroyed.
    #[error("worker exceeded the {limit_secs} s wall-clock ceiling")]
    Timeout {
        /// The ceiling that was enforced.
        limit_secs: u64,
    },

    /// The worker exited zero but wrote no output file.
    #[error("worker produced no output file")]
    MissingOutput,

    /// The worker exited zero but the output file is empty.
    #[error("worker produced an empty output file")]
    EmptyOutput,

    /// The container runtime binary could not be invoked at all.
    #[error("container runtime unavailable: {0}")]
    Runtime(#[from] std::io::Error),
}
