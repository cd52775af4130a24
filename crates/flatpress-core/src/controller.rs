//! The job controller facade.
//!
//! Owns one submission's lifecycle end to end:
//!
//! 1. stage and hash the upload,
//! 2. obtain the advisory pre-scan verdict,
//! 3. hand the input to the sandboxed worker (normalize → disarm →
//!    pixel rebuild → validate happens inside the worker),
//! 4. settle the produced artifact with a deterministic handshake,
//! 5. obtain the post-scan verdict — a flagged output is destroyed,
//! 6. read the artifact, clean both staging areas, deliver.
//!
//! Per-job work is strictly sequential; concurrency lives across jobs.
//! No lock is held across any of the suspension points above — the
//! controller owns its [`Job`] exclusively and shares nothing mutable.
//!
//! Entry into either terminal state removes both staged artifacts. The
//! sanitized bytes are read into memory *before* cleanup, so the HTTP
//! layer never holds a handle to a file the controller is about to delete.

use std::future::Future;
use std::path::Path;

use flatpress_reputation::{ReputationClient, ScanVerdict};
use flatpress_sandbox::{SandboxError, SandboxSupervisor};
use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::error::{GatewayError, Result};
use crate::job::{Job, JobId, JobState};
use crate::staging::{sha256_file, StagingArea};

/// Banner attached to deliveries whose pre-scan flagged the input.
pub const THREAT_BANNER: &str = "Original file contained malware - now sanitized";

/// Out-of-band threat metadata attached to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatNotice {
    /// Fixed warning banner.
    pub banner: &'static str,
    /// Detail string of the pre-scan verdict.
    pub detail: String,
}

/// A finished job: the sanitized artifact plus delivery metadata.
#[derive(Debug)]
pub struct SanitizedDelivery {
    /// Suggested download name, `sanitized_<stem>.pdf`.
    pub file_name: String,
    /// The sanitized artifact. Staging has already been cleaned.
    pub bytes: Vec<u8>,
    /// Present when the pre-scan flagged the input.
    pub threat: Option<ThreatNotice>,
}

/// The seam between the controller and the sandboxed worker.
///
/// Production wires this to the container supervisor; lifecycle tests use
/// a stub so the state machine is exercised without a container runtime.
pub trait WorkerBackend: Send + Sync {
    /// Run the worker pipeline on `input`, producing `output`.
    /// Resolves to the captured worker logs.
    fn run(
        &self,
        job_id: &str,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = std::result::Result<String, SandboxError>> + Send;
}

/// Container-backed [`WorkerBackend`] over the sandbox supervisor.
#[derive(Debug)]
pub struct ContainerBackend {
    supervisor: SandboxSupervisor,
}

impl ContainerBackend {
    /// Wrap a supervisor.
    pub fn new(supervisor: SandboxSupervisor) -> Self {
        Self { supervisor }
    }

    /// Access the wrapped supervisor (startup image ensure).
    pub fn supervisor(&self) -> &SandboxSupervisor {
        &self.supervisor
    }
}

impl WorkerBackend for ContainerBackend {
    fn run(
        &self,
        job_id: &str,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = std::result::Result<String, SandboxError>> + Send {
        async move {
            self.supervisor
                .run(job_id, input, output)
                .await
                .map(|report| report.logs)
        }
    }
}

/// Sequences every job through the lifecycle of [`JobState`].
#[derive(Debug)]
pub struct JobController<W: WorkerBackend> {
    staging: StagingArea,
    reputation: ReputationClient,
    backend: W,
    policy: PolicyConfig,
}

impl<W: WorkerBackend> JobController<W> {
    /// Assemble a controller from its collaborators.
    pub fn new(
        staging: StagingArea,
        reputation: ReputationClient,
        backend: W,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            staging,
            reputation,
            backend,
            policy,
        }
    }

    /// The staging area this controller stages into.
    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Process one submission to a terminal state.
    ///
    /// On return — success or failure — neither staged artifact exists.
    pub async fn process(&self, original_name: &str, bytes: &[u8]) -> Result<SanitizedDelivery> {
        let id = JobId::new();
        info!(job = %id, name = original_name, size = bytes.len(), "job received");

        // Rejected uploads stage nothing; there is no job to clean up.
        let staged = self.staging.stage(&id, original_name, bytes).await?;

        let output_path = self.staging.output_path_for(&id);
        let mut job = Job::new(
            id,
            staged.original_name,
            staged.digest,
            staged.input_path,
            output_path,
        );
        job.advance(JobState::Staged);

        match self.drive(&mut job).await {
            Ok(delivery) => {
                self.cleanup(&job).await;
                job.advance(JobState::Delivered);
                Ok(delivery)
            }
            Err(e) => {
                warn!(job = %job.id, error = %e, "job failed");
                self.cleanup(&job).await;
                job.advance(JobState::Failed);
                Err(e)
            }
        }
    }

    /// The fallible middle of the lifecycle, `Staged` through artifact read.
    async fn drive(&self, job: &mut Job) -> Result<SanitizedDelivery> {
        // Advisory pre-scan.
        let pre_scan = self
            .reputation
            .assess(&job.input_path, &job.content_hash)
            .await;
        info!(job = %job.id, verdict = %pre_scan, "pre-scan");
        let threat = threat_notice(&pre_scan);
        job.pre_scan = Some(pre_scan.clone());
        job.advance(JobState::PreScored);

        if pre_scan.is_flagged() && self.policy.reject_flagged_uploads {
            return Err(GatewayError::PolicyRejected(pre_scan.to_string()));
        }

        // Sandboxed sanitization.
        job.advance(JobState::Sandboxed);
        let worker_logs = self
            .backend
            .run(job.id.as_str(), &job.input_path, &job.output_path)
            .await?;
        debug!(job = %job.id, logs = %worker_logs, "worker output");
        job.advance(JobState::Produced);

        // Deterministic handshake: the artifact must be durably on disk
        // before anything downstream opens it.
        settle_output(&job.output_path).await?;

        // Post-scan gates delivery.
        let output_digest = sha256_file(&job.output_path).await?;
        let post_scan = self
            .reputation
            .assess(&job.output_path, &output_digest)
            .await;
        info!(job = %job.id, verdict = %post_scan, "post-scan");
        let flagged = post_scan.is_flagged();
        let detail = post_scan.to_string();
        job.post_scan = Some(post_scan);

        if flagged {
            warn!(job = %job.id, "sanitized output flagged, destroying");
            let _ = tokio::fs::remove_file(&job.output_path).await;
            return Err(GatewayError::OutputRejected(detail));
        }

        // Read before cleanup so delivery never races artifact removal.
        let bytes = tokio::fs::read(&job.output_path).await?;
        Ok(SanitizedDelivery {
            file_name: delivery_name(&job.original_name),
            bytes,
            threat,
        })
    }

    /// Remove both staged artifacts. Idempotent; absence is fine.
    async fn cleanup(&self, job: &Job) {
        for path in [&job.input_path, &job.output_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(job = %job.id, path = %path.display(), "staged artifact removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    // The sweeper is the failsafe for anything left behind.
                    warn!(job = %job.id, path = %path.display(), error = %e, "cleanup failed");
                }
            }
        }
    }
}

/// The threat metadata a pre-scan verdict propagates, if any.
fn threat_notice(pre_scan: &ScanVerdict) -> Option<ThreatNotice> {
    pre_scan.is_flagged().then(|| ThreatNotice {
        banner: THREAT_BANNER,
        detail: pre_scan.to_string(),
    })
}

/// Download name for a sanitized artifact: `sanitized_<stem>.pdf`.
fn delivery_name(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_name.to_string());
    format!("sanitized_{stem}.pdf")
}

/// Reopen the produced artifact, force it to disk, and confirm it is
/// nonzero. Replaces a fixed quiescence sleep with an observable handshake
/// against the worker's final flush.
async fn settle_output(path: &Path) -> Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| GatewayError::OutputUnsettled(format!("reopen failed: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| GatewayError::OutputUnsettled(format!("sync failed: {e}")))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| GatewayError::OutputUnsettled(format!("stat failed: {e}")))?
        .len();
    if len == 0 {
        return Err(GatewayError::OutputUnsettled("artifact is empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatpress_reputation::AnalysisStats;

    #[test]
    fn test_threat_notice_for_flagged_verdicts() {
        let malicious = ScanVerdict::from_stats(&AnalysisStats {
            malicious: 5,
            ..Default::default()
        });
        let notice = threat_notice(&malicious).unwrap();
        assert_eq!(notice.banner, THREAT_BANNER);
        assert!(notice.detail.contains("5 engines"));
    }

    #[test]
    fn test_no_threat_notice_for_clean_or_indeterminate() {
        assert!(threat_notice(&ScanVerdict::Clean { engines_total: 70 }).is_none());
        assert!(threat_notice(&ScanVerdict::indeterminate("offline")).is_none());
    }

    #[test]
    fn test_delivery_name_uses_stem() {
        assert_eq!(delivery_name("report.docx"), "sanitized_report.pdf");
        assert_eq!(delivery_name("archive.tar.pdf"), "sanitized_archive.tar.pdf");
        assert_eq!(delivery_name("noext"), "sanitized_noext.pdf");
    }

    #[tokio::test]
    async fn test_settle_output_rejects_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("never.pdf");
        assert!(settle_output(&missing).await.is_err());

        let empty = dir.path().join("empty.pdf");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(matches!(
            settle_output(&empty).await,
            Err(GatewayError::OutputUnsettled(_))
        ));

        let ok = dir.path().join("ok.pdf");
        tokio::fs::write(&ok, b"%PDF-1.4").await.unwrap();
        assert!(settle_output(&ok).await.is_ok());
    }
}
