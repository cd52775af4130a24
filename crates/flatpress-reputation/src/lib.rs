//! # Flatpress Reputation
//!
//! Multi-engine reputation scanning for the Flatpress sanitization gateway.
//!
//! The gateway consults an external multi-engine antivirus service twice per
//! job: once on the raw upload (pre-scan) and once on the sanitized output
//! (post-scan). This crate owns both the wire protocol and the verdict
//! taxonomy; policy — what a verdict *means* at each position — belongs to
//! the job controller.
//!
//! ## Fail-open contract
//!
//! Reputation is defense-in-depth, not the disarm. The client therefore
//! never surfaces an error: a missing credential, a refused connection, or
//! an analysis that never completes all collapse into
//! [`ScanVerdict::Indeterminate`], and processing proceeds. The pixel
//! reconstruction pass inside the sandbox is the security control that
//! actually neutralizes content.

mod client;
mod error;
mod verdict;

pub use client::{ReputationClient, DEFAULT_BASE_URL};
pub use error::{ReputationError, Result};
pub use verdict::{AnalysisStats, ScanVerdict, SUSPICIOUS_TOLERANCE};
