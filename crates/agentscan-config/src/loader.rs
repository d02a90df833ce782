// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./agentscan.toml` > `~/.config/agentscan/agentscan.toml`
//! > `/etc/agentscan/agentscan.toml` with environment variable overrides via
//! the `AGENTSCAN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AgentscanConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/agentscan/agentscan.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "agentscan.toml";

/// Per-user config file under the XDG config directory, if one exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("agentscan").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/agentscan/agentscan.toml`
/// 3. `~/.config/agentscan/agentscan.toml`
/// 4. `./agentscan.toml`
/// 5. `AGENTSCAN_*` environment variables
pub fn load_config() -> Result<AgentscanConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<AgentscanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AgentscanConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AgentscanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AgentscanConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for hierarchy loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AgentscanConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping the first underscore-delimited section to a dot.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `AGENTSCAN_SERVICE_WORKER_COUNT` must map to
/// `service.worker_count`, not `service.worker.count`.
fn env_provider() -> Env {
    Env::prefixed("AGENTSCAN_").map(|key| {
        let key_str = key.as_str();
        let mapped = [
            "service_",
            "queue_",
            "storage_",
            "metrics_",
            "agent_manager_",
        ]
        .iter()
        .find(|section| key_str.starts_with(*section))
        .map(|section| {
            let name = section.trim_end_matches('_');
            format!("{name}.{}", &key_str[section.len()..])
        })
        .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}
