// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the agentscan engine.
//!
//! Other crates record through the helpers in [`recording`]; the binary
//! installs a [`PrometheusExporter`] when metrics are enabled.

pub mod recording;

use std::net::SocketAddr;

use agentscan_core::AgentscanError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use recording::{
    record_agent_scan, record_job_enqueued, record_job_processed, register_metrics,
    set_agent_health, set_queue_depth,
};

/// Installed Prometheus recorder.
///
/// Only one recorder can be installed per process.
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Install the recorder globally without an HTTP endpoint.
    pub fn install() -> Result<Self, AgentscanError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            AgentscanError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Install the recorder globally and serve `/metrics` on `addr`.
    ///
    /// Must be called from within a tokio runtime; the listener runs as a
    /// spawned task for the life of the process.
    pub fn install_with_listener(addr: SocketAddr) -> Result<Self, AgentscanError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(addr)
            .build()
            .map_err(|e| {
                AgentscanError::Internal(format!("failed to build Prometheus exporter: {e}"))
            })?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| {
            AgentscanError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "prometheus exporter stopped");
            }
        });

        recording::register_metrics();
        tracing::info!(%addr, "prometheus metrics endpoint listening");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global recorder can only be installed once per process, so these
    // tests record through a thread-local recorder instead.
    fn render_with_local_recorder(record: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, record);
        handle.render()
    }

    #[test]
    fn job_metrics_render_with_labels() {
        let rendered = render_with_local_recorder(|| {
            record_job_enqueued("high");
            record_job_processed("worker-1", "completed", 1.5);
        });
        assert!(rendered.contains("agentscan_jobs_enqueued_total{priority=\"high\"} 1"));
        assert!(rendered.contains("outcome=\"completed\""));
        assert!(rendered.contains("agentscan_job_duration_seconds"));
    }

    #[test]
    fn unhealthy_agent_counts_a_failure() {
        let rendered = render_with_local_recorder(|| {
            set_agent_health("semgrep", true);
            set_agent_health("bandit", false);
        });
        assert!(rendered.contains("agentscan_agent_health{agent=\"semgrep\"} 1"));
        assert!(rendered.contains("agentscan_agent_health{agent=\"bandit\"} 0"));
        assert!(rendered.contains("agentscan_agent_health_failures_total{agent=\"bandit\"} 1"));
        assert!(!rendered.contains("agentscan_agent_health_failures_total{agent=\"semgrep\"}"));
    }

    #[test]
    fn queue_depth_is_a_gauge_per_status() {
        let rendered = render_with_local_recorder(|| {
            set_queue_depth("queued", 4);
            set_queue_depth("queued", 2);
        });
        assert!(rendered.contains("agentscan_queue_depth{status=\"queued\"} 2"));
    }
}
