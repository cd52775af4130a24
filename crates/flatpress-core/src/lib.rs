//! # Flatpress Core
//!
//! Job lifecycle orchestration for the Flatpress sanitization gateway.
//!
//! A submission is one [`Job`], owned by one task, sequenced through one
//! strictly ordered lifecycle. The controller chains the component crates
//! so that their composition yields the security guarantee:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        JOB CONTROLLER                          │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  upload ─▶ stage/hash ─▶ pre-scan ─▶ sandboxed worker ─▶ ...   │
//! │              (core)    (reputation)     (sandbox)              │
//! │                                                                │
//! │  ... ─▶ settle ─▶ post-scan ─▶ read ─▶ cleanup ─▶ deliver      │
//! │         (core)   (reputation)        (core)                    │
//! │                                                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inside the sandboxed worker the CDR crate runs normalize → disarm →
//! rasterize → re-emit → validate; this crate never touches document
//! internals itself.
//!
//! ## Lifecycle invariants
//!
//! - Transitions within a job are strictly ordered; nothing advances a job
//!   concurrently because nothing else holds it.
//! - Entry into `Delivered` or `Failed` removes both staged artifacts.
//! - At most one sandbox instance exists per job, and it is destroyed
//!   before the supervisor returns.
//! - Reputation is advisory at pre-scan, a gate at post-scan, and fail-open
//!   when indeterminate at either position.

pub mod config;
mod controller;
mod error;
mod job;
pub mod staging;
pub mod sweeper;

pub use config::{
    GatewayConfig, HttpConfig, PolicyConfig, ReputationConfig, SandboxSettings, StagingConfig,
    SweeperConfig,
};
pub use controller::{
    ContainerBackend, JobController, SanitizedDelivery, ThreatNotice, WorkerBackend, THREAT_BANNER,
};
pub use error::{GatewayError, Result};
pub use job::{Job, JobId, JobState};
pub use staging::{
    safe_basename, sha256_file, StagedUpload, StagingArea, ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES,
};

// Re-export component types the gateway wires together.
pub use flatpress_reputation::{ReputationClient, ScanVerdict};
pub use flatpress_sandbox::{SandboxConfig, SandboxError, SandboxSupervisor};
