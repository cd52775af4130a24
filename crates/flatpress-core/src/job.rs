//! Job model and lifecycle states.
//!
//! A [`Job`] is one submission, owned exclusively by the controller task
//! that created it. Jobs are never persisted and never shared: state
//! transitions are strictly ordered within the owning task, and nothing of
//! a job outlives delivery or failure except log lines.

use std::path::PathBuf;

use flatpress_reputation::ScanVerdict;
use tracing::info;
use uuid::Uuid;

/// Opaque job identifier (UUID v4), fresh per submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a job.
///
/// ```text
/// received ─▶ staged ─▶ pre_scored ─▶ sandboxed ─▶ produced ─▶ delivered
///     │           │           │            │            │
///     └───────────┴───────────┴────────────┴────────────┴────▶ failed
/// ```
///
/// `Delivered` and `Failed` are terminal. Every non-terminal state may fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Submission accepted, nothing on disk yet.
    Received,
    /// Input staged and hashed.
    Staged,
    /// Pre-scan verdict recorded.
    PreScored,
    /// Worker launched in its sandbox.
    Sandboxed,
    /// Worker succeeded; output exists.
    Produced,
    /// Artifact handed to the caller; staging cleaned.
    Delivered,
    /// Terminal failure; staging cleaned.
    Failed,
}

impl JobState {
    /// True for `Delivered` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        // Any non-terminal state may fail (timeout, panic, policy).
        if next == Self::Failed {
            return true;
        }
        matches!(
            (self, next),
            (Self::Received, Self::Staged)
                | (Self::Staged, Self::PreScored)
                | (Self::PreScored, Self::Sandboxed)
                | (Self::Sandboxed, Self::Produced)
                | (Self::Produced, Self::Delivered)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Staged => "staged",
            Self::PreScored => "pre_scored",
            Self::Sandboxed => "sandboxed",
            Self::Produced => "produced",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One submission's worth of state, owned by its controller task.
#[derive(Debug)]
pub struct Job {
    /// Fresh opaque identifier.
    pub id: JobId,
    /// Sanitized basename of the uploaded file.
    pub original_name: String,
    /// SHA-256 of the staged input, lowercase hex.
    pub content_hash: String,
    /// Staged input path.
    pub input_path: PathBuf,
    /// Reserved output path.
    pub output_path: PathBuf,
    /// Verdict from the pre-scan, once obtained.
    pub pre_scan: Option<ScanVerdict>,
    /// Verdict from the post-scan, once obtained.
    pub post_scan: Option<ScanVerdict>,
    state: JobState,
}

impl Job {
    /// Create a job in `Received` with its staged paths already reserved.
    pub fn new(
        id: JobId,
        original_name: String,
        content_hash: String,
        input_path: PathBuf,
        output_path: PathBuf,
    ) -> Self {
        Self {
            id,
            original_name,
            content_hash,
            input_path,
            output_path,
            pre_scan: None,
            post_scan: None,
            state: JobState::Received,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, which must be legal per the transition table.
    pub fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        info!(job = %self.id, from = %self.state, to = %next, "job transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            JobId::new(),
            "report.pdf".into(),
            "deadbeef".into(),
            PathBuf::from("/u/x"),
            PathBuf::from("/o/y"),
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut j = job();
        for next in [
            JobState::Staged,
            JobState::PreScored,
            JobState::Sandboxed,
            JobState::Produced,
            JobState::Delivered,
        ] {
            assert!(j.state().can_transition_to(next));
            j.advance(next);
        }
        assert!(j.state().is_terminal());
    }

    #[test]
    fn test_every_nonterminal_state_may_fail() {
        for state in [
            JobState::Received,
            JobState::Staged,
            JobState::PreScored,
            JobState::Sandboxed,
            JobState::Produced,
        ] {
            assert!(state.can_transition_to(JobState::Failed));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [JobState::Delivered, JobState::Failed] {
            for next in [
                JobState::Received,
                JobState::Staged,
                JobState::PreScored,
                JobState::Sandboxed,
                JobState::Produced,
                JobState::Delivered,
                JobState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!JobState::Received.can_transition_to(JobState::PreScored));
        assert!(!JobState::Staged.can_transition_to(JobState::Sandboxed));
        assert!(!JobState::PreScored.can_transition_to(JobState::Produced));
        assert!(!JobState::Sandboxed.can_transition_to(JobState::Delivered));
    }

    #[test]
    fn test_no_moving_backward() {
        assert!(!JobState::Produced.can_transition_to(JobState::Sandboxed));
        assert!(!JobState::Sandboxed.can_transition_to(JobState::Staged));
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
