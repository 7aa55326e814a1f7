//! Prometheus exporter for PM-xxx power meters.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use pmxxx_exporter_prometheus::{ExporterConfig, HttpServer, MeterCollector};
use pmxxx_poller::{HttpFetcher, PollingEngine};

/// Prometheus exporter for PM-xxx power meters.
#[derive(Parser, Debug)]
#[command(name = "pmxxx-exporter-prometheus")]
#[command(about = "Poll PM-xxx power meters and export their readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (overrides config; trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ExporterConfig::default(),
    };
    config.apply_env().context("Invalid environment override")?;

    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    pmxxx_common::init_tracing(&config.logging)?;

    config.validate().context("Invalid configuration")?;

    info!(
        meters = config.poller.meters.len(),
        "Starting PM-xxx Prometheus Exporter"
    );

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.prometheus.listen))?;

    // Create the collector and the engine feeding it
    let collector = Arc::new(MeterCollector::new(config.prometheus.prefix.clone()));
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let engine = PollingEngine::from_config(&config.poller, fetcher, collector.clone())
        .context("Failed to create polling engine")?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        collector.clone(),
        engine.registry().clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );

    engine.start_scheduler();

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = wait_for_sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    let grace = config.shutdown_grace();
    if tokio::time::timeout(grace, async {
        engine.stop_scheduler().await;
        let _ = http_task.await;
    })
    .await
    .is_err()
    {
        error!(grace_secs = grace.as_secs(), "Shutdown timed out");
    }

    // Print final stats
    let stats = collector.stats();
    info!(
        updates = stats.updates,
        downs = stats.downs,
        removals = stats.removals,
        meters = collector.meter_count(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
