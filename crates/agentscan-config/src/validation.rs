// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::diagnostic::ConfigError;
use crate::model::AgentscanConfig;

/// Validate a deserialized configuration, collecting every failure.
pub fn validate_config(config: &AgentscanConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let service = &config.service;
    if service.worker_count == 0 {
        fail("service.worker_count must be at least 1".to_string());
    }
    for (key, value) in [
        ("service.poll_interval_ms", service.poll_interval_ms),
        (
            "service.health_check_interval_secs",
            service.health_check_interval_secs,
        ),
        ("service.cleanup_interval_secs", service.cleanup_interval_secs),
        ("service.shutdown_timeout_secs", service.shutdown_timeout_secs),
        (
            "service.default_scan_timeout_secs",
            service.default_scan_timeout_secs,
        ),
        (
            "agent_manager.health_check_timeout_secs",
            config.agent_manager.health_check_timeout_secs,
        ),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than 0"));
        }
    }

    let queue = &config.queue;
    if queue.max_attempts == 0 {
        fail("queue.max_attempts must be at least 1".to_string());
    }
    if queue.max_retry_delay_secs < queue.retry_delay_secs {
        fail(format!(
            "queue.max_retry_delay_secs ({}) must not be less than queue.retry_delay_secs ({})",
            queue.max_retry_delay_secs, queue.retry_delay_secs
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.metrics.enabled && config.metrics.listen_address.parse::<SocketAddr>().is_err() {
        fail(format!(
            "metrics.listen_address `{}` is not a valid socket address",
            config.metrics.listen_address
        ));
    }

    let mut seen_names = HashSet::new();
    for (i, agent) in config.agents.iter().enumerate() {
        if agent.name.trim().is_empty() {
            fail(format!("agents[{i}].name must not be empty"));
        } else if !seen_names.insert(agent.name.as_str()) {
            fail(format!(
                "duplicate agent name `{}` in [[agents]] array",
                agent.name
            ));
        }
        if agent.command.trim().is_empty() {
            fail(format!("agents[{i}].command must not be empty"));
        }
        if agent.timeout_secs == 0 {
            fail(format!("agents[{i}].timeout_secs must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
