//! Sanitization worker entry point.
//!
//! Runs inside the sandbox: no network, no capabilities, an in-memory
//! scratch area at `/tmp`, the input mounted read-only, and exactly one
//! writable output path. The contract with the supervisor is environment
//! only — `INPUT_FILE` and `OUTPUT_FILE` — plus the exit code: zero on a
//! validated artifact, nonzero on any failure.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let input = PathBuf::from(std::env::var("INPUT_FILE").context("INPUT_FILE not set")?);
    let output = PathBuf::from(std::env::var("OUTPUT_FILE").context("OUTPUT_FILE not set")?);

    if !input.is_file() {
        bail!("input file not found: {}", input.display());
    }

    info!(input = %input.display(), output = %output.display(), "worker started");

    let scratch = tempfile::tempdir().context("could not create scratch dir")?;
    let report = flatpress_cdr::sanitize_document(&input, &output, scratch.path())
        .await
        .context("sanitization pipeline failed")?;

    info!(
        pages = report.pages,
        annotations_removed = report.disarm.annotated_pages,
        disarm_degraded = report.disarm_degraded,
        "worker finished"
    );
    Ok(())
}
