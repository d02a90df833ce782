// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `agentscan serve` command implementation.
//!
//! Starts the worker pool and the maintenance loops against the configured
//! SQLite store and runs until SIGINT or SIGTERM, then stops the service
//! within the configured shutdown timeout.

use std::net::SocketAddr;

use agentscan_config::AgentscanConfig;
use agentscan_core::AgentscanError;
use agentscan_prometheus::PrometheusExporter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine;

/// Runs the `agentscan serve` command.
pub async fn run_serve(config: AgentscanConfig) -> Result<(), AgentscanError> {
    info!("starting agentscan serve");

    let _exporter = if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.listen_address.parse().map_err(|e| {
            AgentscanError::Config(format!(
                "invalid metrics.listen_address `{}`: {e}",
                config.metrics.listen_address
            ))
        })?;
        match PrometheusExporter::install_with_listener(addr) {
            Ok(exporter) => Some(exporter),
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    let service = engine::open(&config).await?;
    if let Err(e) = service.agents().health_check_all().await {
        warn!(error = %e, "some agents failed their startup health check");
    }

    let cancel = install_signal_handler();
    service.start().await?;
    info!(workers = service.settings().worker_count, "agentscan serving");

    cancel.cancelled().await;
    info!("shutdown requested, stopping service");
    service.stop().await?;

    info!("agentscan serve shutdown complete");
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, waiting for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agentscan={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
