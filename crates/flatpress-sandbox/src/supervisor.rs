//! # Sandbox Supervisor
//!
//! Runs the worker pipeline inside a short-lived, isolated container.
//!
//! ## Isolation contract
//!
//! Every worker instance is launched with:
//! - the upload area bind-mounted read-only at `/worker/input`
//! - the output area bind-mounted read-write at `/worker/output`
//! - no network interfaces (`--network none`)
//! - all capabilities dropped, no privilege escalation
//! - bounded memory and CPU
//! - a private in-memory scratch area at `/tmp`
//! - a hard wall-clock ceiling on the wait
//!
//! ## Disposal invariant
//!
//! The container is destroyed (`rm -f`) on **every** exit path — normal
//! completion, worker failure, launch error, or wall-clock exceedance —
//! before the supervisor returns to the caller. At most one container per
//! job is ever alive.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Result, SandboxError};

/// In-container mount point of the upload area.
const INPUT_MOUNT: &str = "/worker/input";

/// In-container mount point of the output area.
const OUTPUT_MOUNT: &str = "/worker/output";

/// Settings for the container-backed sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Container runtime binary.
    pub runtime: String,

    /// Tag of the worker image.
    pub image: String,

    /// Image recipe used when the image is not locally available.
    pub dockerfile: PathBuf,

    /// Build context for the image recipe.
    pub build_context: PathBuf,

    /// Host-side path of the upload area (bind-mount source).
    pub host_upload_dir: PathBuf,

    /// Host-side path of the output area (bind-mount source).
    pub host_output_dir: PathBuf,

    /// Memory ceiling handed to the runtime.
    pub memory_limit: String,

    /// CPU ceiling handed to the runtime.
    pub cpus: String,

    /// Size/mode spec of the in-memory scratch area at `/tmp`.
    pub scratch_tmpfs: String,

    /// Wall-clock ceiling on the worker wait.
    pub wait_timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "flatpress-worker:latest".to_string(),
            dockerfile: PathBuf::from("docker/Dockerfile.worker"),
            build_context: PathBuf::from("."),
            host_upload_dir: PathBuf::from("uploads"),
            host_output_dir: PathBuf::from("output"),
            memory_limit: "2g".to_string(),
            cpus: "1".to_string(),
            scratch_tmpfs: "size=1g,mode=1777".to_string(),
            wait_timeout: Duration::from_secs(300),
        }
    }
}

/// Result of a successful worker run.
#[derive(Debug)]
pub struct WorkerReport {
    /// Captured worker stdout/stderr for the job log.
    pub logs: String,
}

/// Supervises one worker container per job.
///
/// The supervisor is process-wide: the image probe/build path is serialized
/// behind a [`OnceCell`] so that two jobs racing an absent image trigger a
/// single build.
#[derive(Debug)]
pub struct SandboxSupervisor {
    config: SandboxConfig,
    image_ready: OnceCell<()>,
}

impl SandboxSupervisor {
    /// Create a supervisor. Call once at startup and share.
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            image_ready: OnceCell::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Make sure the worker image exists locally, building it if needed.
    ///
    /// Concurrent callers coalesce into one probe/build. A failed build is
    /// not cached; the next job retries.
    pub async fn ensure_image(&self) -> Result<()> {
        self.image_ready
            .get_or_try_init(|| self.probe_or_build())
            .await
            .map(|_| ())
    }

    async fn probe_or_build(&self) -> Result<()> {
        let probe = Command::new(&self.config.runtime)
            .args(["image", "inspect", &self.config.image])
            .output()
            .await?;
        if probe.status.success() {
            debug!(image = %self.config.image, "worker image present");
            return Ok(());
        }

        info!(image = %self.config.image, "worker image missing, building");
        let build = Command::new(&self.config.runtime)
            .arg("build")
            .arg("-f")
            .arg(&self.config.dockerfile)
            .arg("-t")
            .arg(&self.config.image)
            .arg(&self.config.build_context)
            .output()
            .await?;
        if !build.status.success() {
            return Err(SandboxError::Build {
                detail: tail(&build.stderr, 2000),
            });
        }
        info!(image = %self.config.image, "worker image built");
        Ok(())
    }

    /// Run the worker pipeline on `input`, expecting it to write `output`.
    ///
    /// `input` and `output` are paths inside the shared upload/output areas;
    /// only their basenames cross the container boundary.
    pub async fn run(&self, job_id: &str, input: &Path, output: &Path) -> Result<WorkerReport> {
        self.ensure_image().await?;

        let name = container_name(job_id);
        let result = self.launch_and_wait(&name, input, output).await;

        // Unconditional disposal, before any result propagates.
        self.destroy(&name).await;

        let report = result?;

        let meta = tokio::fs::metadata(output)
            .await
            .map_err(|_| SandboxError::MissingOutput)?;
        if meta.len() == 0 {
            return Err(SandboxError::EmptyOutput);
        }

        Ok(report)
    }

    async fn launch_and_wait(&self, name: &str, input: &Path, output: &Path) -> Result<WorkerReport> {
        let args = self.run_args(name, input, output);
        debug!(container = name, "launching worker");

        let launched = Command::new(&self.config.runtime).args(&args).output().await?;
        if !launched.status.success() {
            return Err(SandboxError::Launch {
                detail: tail(&launched.stderr, 2000),
            });
        }

        let waited = tokio::time::timeout(self.config.wait_timeout, self.wait_for(name)).await;
        let exit_code = match waited {
            Ok(code) => code?,
            Err(_) => {
                warn!(container = name, "worker hit wall-clock ceiling");
                return Err(SandboxError::Timeout {
                    limit_secs: self.config.wait_timeout.as_secs(),
                });
            }
        };

        let logs = self.collect_logs(name).await;
        if exit_code != 0 {
            return Err(SandboxError::WorkerFailed {
                code: exit_code,
                logs,
            });
        }

        info!(container = name, "worker completed");
        Ok(WorkerReport { logs })
    }

    /// Argument vector for the `run` invocation. Split out so the isolation
    /// contract is unit-testable without a container runtime.
    fn run_args(&self, name: &str, input: &Path, output: &Path) -> Vec<String> {
        let input_base = basename(input);
        let output_base = basename(output);

        vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            name.into(),
            "--network".into(),
            "none".into(),
            "--cap-drop".into(),
            "ALL".into(),
            "--security-opt".into(),
            "no-new-privileges:true".into(),
            "--memory".into(),
            self.config.memory_limit.clone(),
            "--cpus".into(),
            self.config.cpus.clone(),
            "--tmpfs".into(),
            format!("/tmp:{}", self.config.scratch_tmpfs),
            "-v".into(),
            format!(
                "{}:{}:ro",
                self.config.host_upload_dir.display(),
                INPUT_MOUNT
            ),
            "-v".into(),
            format!(
                "{}:{}:rw",
                self.config.host_output_dir.display(),
                OUTPUT_MOUNT
            ),
            "-e".into(),
            format!("INPUT_FILE={}/{}", INPUT_MOUNT, input_base),
            "-e".into(),
            format!("OUTPUT_FILE={}/{}", OUTPUT_MOUNT, output_base),
            self.config.image.clone(),
        ]
    }

    async fn wait_for(&self, name: &str) -> Result<i64> {
        let waited = Command::new(&self.config.runtime)
            .args(["wait", name])
            .output()
            .await?;
        if !waited.status.success() {
            return Err(SandboxError::Launch {
                detail: tail(&waited.stderr, 2000),
            });
        }
        let code = String::from_utf8_lossy(&waited.stdout)
            .trim()
            .parse::<i64>()
            .unwrap_or(-1);
        Ok(code)
    }

    async fn collect_logs(&self, name: &str) -> String {
        match Command::new(&self.config.runtime)
            .args(["logs", name])
            .output()
            .await
        {
            Ok(out) => {
                let mut logs = String::from_utf8_lossy(&out.stdout).into_owned();
                logs.push_str(&String::from_utf8_lossy(&out.stderr));
                logs
            }
            Err(e) => {
                warn!(container = name, error = %e, "could not collect worker logs");
                String::new()
            }
        }
    }

    async fn destroy(&self, name: &str) {
        match Command::new(&self.config.runtime)
            .args(["rm", "-f", name])
            .output()
            .await
        {
            Ok(out) if out.status.success() => {
                debug!(container = name, "container destroyed");
            }
            Ok(out) => {
                // Launch failures leave nothing to remove; anything else is
                // surfaced so an operator can reap by hand.
                debug!(
                    container = name,
                    detail = %tail(&out.stderr, 200),
                    "container removal reported an error"
                );
            }
            Err(e) => {
                warn!(container = name, error = %e, "container removal failed");
            }
        }
    }
}

/// Container name for a job, unique per job id.
fn container_name(job_id: &str) -> String {
    format!("flatpress-worker-{}", job_id)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Last `max` bytes of process output, lossily decoded.
fn tail(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> SandboxSupervisor {
        let config = SandboxConfig {
            host_upload_dir: PathBuf::from("/srv/flatpress/uploads"),
            host_output_dir: PathBuf::from("/srv/flatpress/output"),
            ..SandboxConfig::default()
        };
        SandboxSupervisor::new(config)
    }

    fn args_for(job: &str) -> Vec<String> {
        supervisor().run_args(
            &container_name(job),
            Path::new("/data/uploads/j1_report.pdf"),
            Path::new("/data/output/j1_sanitized.pdf"),
        )
    }

    #[test]
    fn test_input_mount_is_read_only() {
        let args = args_for("j1");
        assert!(args
            .iter()
            .any(|a| a == "/srv/flatpress/uploads:/worker/input:ro"));
        assert!(args
            .iter()
            .any(|a| a == "/srv/flatpress/output:/worker/output:rw"));
    }

    #[test]
    fn test_network_is_disabled() {
        let args = args_for("j1");
        let pos = args.iter().position(|a| a == "--network").unwrap();
        assert_eq!(args[pos + 1], "none");
    }

    #[test]
    fn test_capabilities_and_privileges_dropped() {
        let args = args_for("j1");
        let cap = args.iter().position(|a| a == "--cap-drop").unwrap();
        assert_eq!(args[cap + 1], "ALL");
        let sec = args.iter().position(|a| a == "--security-opt").unwrap();
        assert_eq!(args[sec + 1], "no-new-privileges:true");
    }

    #[test]
    fn test_scratch_is_in_memory() {
        let args = args_for("j1");
        assert!(args.iter().any(|a| a == "/tmp:size=1g,mode=1777"));
    }

    #[test]
    fn test_worker_env_carries_basenames_only() {
        let args = args_for("j1");
        assert!(args
            .iter()
            .any(|a| a == "INPUT_FILE=/worker/input/j1_report.pdf"));
        assert!(args
            .iter()
            .any(|a| a == "OUTPUT_FILE=/worker/output/j1_sanitized.pdf"));
        assert!(!args.iter().any(|a| a.contains("/data/uploads")));
    }

    #[test]
    fn test_container_name_is_job_scoped() {
        assert_eq!(container_name("abc123"), "flatpress-worker-abc123");
    }

    #[test]
    fn test_tail_keeps_the_end() {
        assert_eq!(tail(b"abcdef", 3), "def");
        assert_eq!(tail(b"ab", 10), "ab");
    }
}
