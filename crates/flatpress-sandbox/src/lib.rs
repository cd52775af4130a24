//! # Flatpress Sandbox
//!
//! Short-lived container supervision for untrusted document processing.
//!
//! Every submission is processed inside a fresh, disposable container with
//! no network, no capabilities, bounded resources, and a hard wall-clock
//! ceiling. The supervisor owns the container's full lifecycle:
//!
//! 1. Probe for the worker image; build it from the in-tree recipe on miss
//!    (serialized process-wide, so racing jobs trigger one build).
//! 2. Launch exactly one worker with the job's input mounted read-only and
//!    the output area mounted read-write.
//! 3. Wait, bounded by the wall-clock ceiling.
//! 4. Capture worker output for the job log.
//! 5. Destroy the container — unconditionally, on every exit path.
//!
//! Worker images are immutable once built and no container state is ever
//! shared between jobs.

mod error;
mod supervisor;

pub use error::{Result, SandboxError};
pub use supervisor::{SandboxConfig, SandboxSupervisor, WorkerReport};
