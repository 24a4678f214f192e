//! Prometheus exporter for KNX group address values.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use knxmetrics::{ExporterConfig, Server, ZenohTransport};

/// Prometheus exporter for KNX group address values.
#[derive(Parser, Debug)]
#[command(name = "knxmetrics")]
#[command(about = "Export KNX group address values as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = "knxmetrics.json5")]
    config: String,

    /// HTTP listen address, host:port (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ExporterConfig::load_from_file(&args.config)?;

    if let Some(listen) = &args.listen {
        config.server.set_listen_addr(listen)?;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    knxmetrics_common::init_tracing(&config.logging)?;

    info!(config = %args.config, "Starting knxmetrics");

    let session = knxmetrics_common::connect(&config.gateway).await?;
    let transport = ZenohTransport::new(
        session.clone(),
        &config.gateway.key_prefix,
        config.gateway.format,
    );

    let server = Server::new(config, Arc::new(transport))?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let result = server.run(shutdown).await;

    let stats = server.stats();
    info!(
        recorded = stats.recorded,
        ignored = stats.ignored,
        unknown_address = stats.unknown_address,
        undecodable = stats.undecodable,
        "Final statistics"
    );

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close gateway session");
    }

    if let Err(e) = &result {
        error!(error = %e, "knxmetrics failed");
    }
    info!("knxmetrics stopped");
    Ok(result?)
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }

    shutdown.cancel();
}
