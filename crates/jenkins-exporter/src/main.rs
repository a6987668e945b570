//! jenkins-exporter — Prometheus exporter for Jenkins build history.
//!
//! Assembles the exporter in one process:
//! - Jenkins HTTP client
//! - Refresh loop filling the in-memory sample window
//! - Prometheus registry with the Jenkins collector
//! - HTTP server for scrapes
//!
//! # Usage
//!
//! ```text
//! JENKINS_TOKEN=... jenkins-exporter --jenkins-url http://jenkins:8080 --jenkins-user bot
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use jenkins_client::JenkinsClient;
use jenkins_exporter::{Cli, ExporterConfig, build_router, logging};
use jenkins_metrics::{CollectorState, JenkinsCollector, JenkinsFetcher, RefreshLoop};
use prometheus::Registry;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let config = ExporterConfig::resolve(&cli).context("invalid configuration")?;
    run(config).await
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    info!(?config, "jenkins exporter starting");

    // ── Jenkins side ───────────────────────────────────────────

    let client = JenkinsClient::new(config.client_config()).context("failed to build jenkins client")?;
    let fetcher = JenkinsFetcher::new(client).with_builds_per_job(config.builds_per_job);

    let state = Arc::new(
        CollectorState::new(config.store_config()).context("failed to create collector state")?,
    );
    let refresh = RefreshLoop::new(fetcher, state.clone(), config.poll_interval)
        .with_fetch_timeout(config.fetch_timeout);

    // ── Registry ───────────────────────────────────────────────

    let registry = Registry::new();
    registry
        .register(Box::new(JenkinsCollector::new(state)))
        .context("failed to register jenkins collector")?;

    // ── Background refresh ─────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_handle = tokio::spawn(refresh.run(shutdown_rx));

    // ── HTTP server ────────────────────────────────────────────

    let router = build_router(registry, &config.telemetry_path);
    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;

    info!(
        addr = %config.listen_address,
        telemetry_path = %config.telemetry_path,
        "listening for scrapes"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to install ctrl-c handler, running until killed");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("http server failed")?;

    if let Err(e) = refresh_handle.await {
        error!(error = %e, "refresh loop task failed");
    }

    info!("jenkins exporter stopped");
    Ok(())
}
