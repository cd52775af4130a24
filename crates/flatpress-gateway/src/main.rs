//! Flatpress gateway - document sanitization service.
//!
//! Startup order matters: staging dirs first, then a sweep of anything a
//! previous process left behind, then the worker image (refusing to serve
//! without it beats failing the first upload), then the periodic sweeper,
//! then the listener.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use flatpress_core::{
    sweeper, ContainerBackend, GatewayConfig, JobController, ReputationClient, SandboxSupervisor,
    StagingArea,
};

mod routes;

#[derive(Parser)]
#[command(name = "flatpress")]
#[command(about = "Flatpress - document sanitization gateway")]
struct Cli {
    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = GatewayConfig::from_env();
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    if config.reputation.api_key.is_some() {
        info!("reputation credential configured");
    } else {
        warn!("VIRUSTOTAL_API_KEY not set - reputation scans run degraded (fail-open)");
    }

    let staging = StagingArea::new(&config.staging.upload_dir, &config.staging.output_dir);
    staging
        .ensure_dirs()
        .await
        .context("could not create staging areas")?;

    let retirement_age = Duration::from_secs(config.sweeper.retirement_age_secs);
    let swept = sweeper::sweep_once(
        &[staging.upload_dir(), staging.output_dir()],
        retirement_age,
    );
    info!(swept, "startup sweep complete");

    // Build (or find) the worker image before accepting uploads; a gateway
    // that cannot sanitize should not listen.
    let supervisor = SandboxSupervisor::new(config.sandbox_config());
    supervisor
        .ensure_image()
        .await
        .context("worker image unavailable")?;

    let reputation = ReputationClient::with_base_url(
        config.reputation.api_key.clone(),
        config.reputation.base_url.clone(),
    );
    let controller = Arc::new(JobController::new(
        staging,
        reputation,
        ContainerBackend::new(supervisor),
        config.policy.clone(),
    ));

    tokio::spawn(sweeper::run_periodic(
        vec![
            config.staging.upload_dir.clone(),
            config.staging.output_dir.clone(),
        ],
        retirement_age,
        Duration::from_secs(config.sweeper.interval_secs),
    ));

    let app = routes::router(controller);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http.port))
        .await
        .with_context(|| format!("could not bind port {}", config.http.port))?;
    info!(port = config.http.port, "flatpress gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
