// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for agentscan.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level agentscan configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentscanConfig {
    /// Orchestration service and worker pool settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Job queue retry and maintenance settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Agent manager settings.
    #[serde(default)]
    pub agent_manager: AgentManagerConfig,

    /// External command agents available to the engine.
    #[serde(default)]
    pub agents: Vec<CommandAgentConfig>,
}

/// Orchestration service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of concurrent workers draining the queue.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Sleep between empty dequeue polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between agent health sweeps.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Interval between queue maintenance passes.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Maximum wait for workers and loops to exit on stop.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Scan timeout used when a request does not set one.
    #[serde(default = "default_scan_timeout_secs")]
    pub default_scan_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            worker_count: default_worker_count(),
            poll_interval_ms: default_poll_interval_ms(),
            health_check_interval_secs: default_health_check_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            default_scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn default_scan_timeout(&self) -> Duration {
        Duration::from_secs(self.default_scan_timeout_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_worker_count() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_health_check_interval_secs() -> u64 {
    30
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_scan_timeout_secs() -> u64 {
    600
}

/// Job queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Execution attempts before a job is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay of the exponential retry backoff.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound on a single retry delay.
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,

    /// Extra time past a job's timeout before its claim counts as abandoned.
    #[serde(default = "default_lease_grace_secs")]
    pub lease_grace_secs: u64,

    /// How long completed and cancelled jobs are kept.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            lease_grace_secs: default_lease_grace_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    30
}

fn default_max_retry_delay_secs() -> u64 {
    3600
}

fn default_lease_grace_secs() -> u64 {
    60
}

fn default_retention_secs() -> u64 {
    86_400
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("agentscan").join("agentscan.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("agentscan.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and HTTP listener.
    #[serde(default)]
    pub enabled: bool,

    /// Socket address of the scrape endpoint.
    #[serde(default = "default_metrics_listen_address")]
    pub listen_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: default_metrics_listen_address(),
        }
    }
}

fn default_metrics_listen_address() -> String {
    "127.0.0.1:9464".to_string()
}

/// Agent manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentManagerConfig {
    /// Upper bound on a single agent health probe.
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,
}

impl Default for AgentManagerConfig {
    fn default() -> Self {
        Self {
            health_check_timeout_secs: default_health_check_timeout_secs(),
        }
    }
}

impl AgentManagerConfig {
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}

fn default_health_check_timeout_secs() -> u64 {
    30
}

/// An external scanning command exposed as an agent.
///
/// The command receives the scan parameters through `AGENTSCAN_*` environment
/// variables and prints `{"findings": [...]}` JSON on stdout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommandAgentConfig {
    /// Unique agent name used in scan requests.
    pub name: String,

    /// Executable to run.
    pub command: String,

    /// Arguments passed on every scan.
    #[serde(default)]
    pub args: Vec<String>,

    /// Arguments for the health probe.
    #[serde(default = "default_health_args")]
    pub health_args: Vec<String>,

    /// Languages the tool understands.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Vulnerability categories the tool reports (snake_case names).
    #[serde(default)]
    pub categories: Vec<String>,

    /// Whether the tool runs inside a container.
    #[serde(default)]
    pub requires_docker: bool,

    /// Per-scan timeout for this tool.
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_health_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_agent_timeout_secs() -> u64 {
    300
}
