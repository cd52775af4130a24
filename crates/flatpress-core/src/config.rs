//! Configuration types for the Flatpress gateway.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the sanitization gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP listener settings.
    pub http: HttpConfig,

    /// Staging area settings.
    pub staging: StagingConfig,

    /// Reputation service settings.
    pub reputation: ReputationConfig,

    /// Sandbox / container runtime settings.
    pub sandbox: SandboxSettings,

    /// Orphaned-artifact sweeper settings.
    pub sweeper: SweeperConfig,

    /// Verdict policy switches.
    pub policy: PolicyConfig,
}

impl GatewayConfig {
    /// Defaults overlaid with the process environment:
    /// `VIRUSTOTAL_API_KEY` (reputation credential, absent = degraded mode)
    /// and `HOST_PWD` (host-side prefix for the sandbox bind mounts).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.reputation.api_key = std::env::var("VIRUSTOTAL_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        config.sandbox.host_root = std::env::var("HOST_PWD").ok().map(PathBuf::from);
        config
    }

    /// Project this config onto the sandbox crate's settings.
    ///
    /// Bind-mount sources must be host-absolute when the gateway itself
    /// runs containerized, so `HOST_PWD` takes precedence over the local
    /// staging dirs.
    pub fn sandbox_config(&self) -> flatpress_sandbox::SandboxConfig {
        let (host_upload_dir, host_output_dir) = match &self.sandbox.host_root {
            Some(root) => (root.join("uploads"), root.join("output")),
            None => (
                self.staging.upload_dir.clone(),
                self.staging.output_dir.clone(),
            ),
        };
        flatpress_sandbox::SandboxConfig {
            runtime: self.sandbox.runtime.clone(),
            image: self.sandbox.image.clone(),
            dockerfile: self.sandbox.dockerfile.clone(),
            build_context: self.sandbox.build_context.clone(),
            host_upload_dir,
            host_output_dir,
            memory_limit: self.sandbox.memory_limit.clone(),
            cpus: self.sandbox.cpus.clone(),
            scratch_tmpfs: self.sandbox.scratch_tmpfs.clone(),
            wait_timeout: std::time::Duration::from_secs(self.sandbox.wait_timeout_secs),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port to listen on, all interfaces.
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 10400 }
    }
}

/// Staging area settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Upload area.
    pub upload_dir: PathBuf,

    /// Output area.
    pub output_dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Reputation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// API credential; `None` puts the client in degraded (fail-open) mode.
    pub api_key: Option<String>,

    /// Service base URL.
    pub base_url: String,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: flatpress_reputation::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Sandbox / container runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// Container runtime binary.
    pub runtime: String,

    /// Worker image tag.
    pub image: String,

    /// Image recipe path.
    pub dockerfile: PathBuf,

    /// Image build context.
    pub build_context: PathBuf,

    /// Host-side prefix for bind-mount sources (`HOST_PWD`).
    pub host_root: Option<PathBuf>,

    /// Worker memory ceiling.
    pub memory_limit: String,

    /// Worker CPU ceiling.
    pub cpus: String,

    /// tmpfs spec for the worker scratch area.
    pub scratch_tmpfs: String,

    /// Wall-clock ceiling on the worker wait, in seconds.
    pub wait_timeout_secs: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "flatpress-worker:latest".to_string(),
            dockerfile: PathBuf::from("docker/Dockerfile.worker"),
            build_context: PathBuf::from("."),
            host_root: None,
            memory_limit: "2g".to_string(),
            cpus: "1".to_string(),
            scratch_tmpfs: "size=1g,mode=1777".to_string(),
            wait_timeout_secs: 300,
        }
    }
}

/// Orphaned-artifact sweeper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Age past which an unowned staged artifact is reaped.
    pub retirement_age_secs: u64,

    /// Interval between sweeps.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            retirement_age_secs: 3600,
            interval_secs: 300,
        }
    }
}

/// Verdict policy switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Refuse flagged uploads instead of sanitizing them.
    ///
    /// Off by default: the product promises to neutralize, not to refuse.
    /// Pre-scan verdicts then travel as warnings only.
    pub reject_flagged_uploads: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reject_flagged_uploads: false,
        }
    }
}
