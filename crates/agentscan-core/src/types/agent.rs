// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Types exchanged with scanning agents: scan input, scan output, capabilities, health.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity of a reported finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

/// Vulnerability category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VulnCategory {
    SqlInjection,
    Xss,
    Csrf,
    AuthBypass,
    InsecureCrypto,
    HardcodedSecrets,
    PathTraversal,
    CommandInjection,
    InsecureDeserialization,
    VulnerableDependency,
    Misconfiguration,
    Other,
}

/// Parameters handed to an agent for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub repo_url: String,
    pub branch: String,
    pub commit: String,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Restricts an incremental scan to these paths.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Suggested remediation attached to a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub description: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// An issue as reported by an agent, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFinding {
    pub tool: String,
    pub rule_id: String,
    pub severity: Severity,
    pub category: VulnCategory,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub fix: Option<FixSuggestion>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub references: Vec<String>,
}

/// Tool metadata for one scan run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    #[serde(default)]
    pub tool_version: String,
    #[serde(default)]
    pub files_scanned: u64,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub command_line: Option<String>,
}

/// Successful output of one agent scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutput {
    pub agent: String,
    pub findings: Vec<AgentFinding>,
    #[serde(default)]
    pub metadata: ScanMetadata,
    pub duration: Duration,
}

/// Declared capabilities of an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
    pub supported_languages: Vec<String>,
    pub categories: Vec<VulnCategory>,
    /// Whether the tool needs an isolated container runtime.
    pub requires_docker: bool,
    pub default_timeout: Duration,
    pub max_memory_mb: Option<u64>,
    pub max_cpu_cores: Option<f64>,
}

impl AgentConfig {
    pub fn supports_any_language(&self, languages: &[String]) -> bool {
        languages.iter().any(|wanted| {
            self.supported_languages
                .iter()
                .any(|lang| lang.eq_ignore_ascii_case(wanted))
        })
    }

    pub fn covers_any_category(&self, categories: &[VulnCategory]) -> bool {
        categories.iter().any(|c| self.categories.contains(c))
    }
}

/// Liveness of an agent as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Health record tracked per registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub status: HealthState,
    pub last_check: Option<DateTime<Utc>>,
    pub check_count: u64,
    pub failure_count: u64,
    pub last_error: Option<String>,
}

impl Default for AgentHealth {
    fn default() -> Self {
        Self {
            status: HealthState::Unknown,
            last_check: None,
            check_count: 0,
            failure_count: 0,
            last_error: None,
        }
    }
}

impl AgentHealth {
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = HealthState::Healthy;
        self.last_check = Some(now);
        self.check_count += 1;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.status = HealthState::Unhealthy;
        self.last_check = Some(now);
        self.check_count += 1;
        self.failure_count += 1;
        self.last_error = Some(error.into());
    }

    /// Record a scan failure without counting it as a health check.
    pub fn record_scan_failure(&mut self, error: impl Into<String>) {
        self.status = HealthState::Unhealthy;
        self.failure_count += 1;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_counters_track_checks_and_failures() {
        let mut health = AgentHealth::default();
        assert_eq!(health.status, HealthState::Unknown);

        let now = Utc::now();
        health.record_failure(now, "connection refused");
        health.record_success(now);
        health.record_failure(now, "timeout");

        assert_eq!(health.check_count, 3);
        assert_eq!(health.failure_count, 2);
        assert_eq!(health.status, HealthState::Unhealthy);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn scan_failure_does_not_count_as_check() {
        let mut health = AgentHealth::default();
        health.record_scan_failure("exit status 2");
        assert_eq!(health.check_count, 0);
        assert_eq!(health.failure_count, 1);
        assert_eq!(health.status, HealthState::Unhealthy);
    }

    #[test]
    fn language_match_ignores_case() {
        let config = AgentConfig {
            name: "bandit".into(),
            supported_languages: vec!["Python".into()],
            ..AgentConfig::default()
        };
        assert!(config.supports_any_language(&["python".into(), "go".into()]));
        assert!(!config.supports_any_language(&["rust".into()]));
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&VulnCategory::HardcodedSecrets).unwrap();
        assert_eq!(json, "\"hardcoded_secrets\"");
        assert_eq!(VulnCategory::SqlInjection.to_string(), "sql_injection");
    }

    #[test]
    fn agent_finding_deserializes_with_optional_fields_missing() {
        let json = r#"{
            "tool": "semgrep",
            "rule_id": "python.sqli",
            "severity": "high",
            "category": "sql_injection",
            "title": "SQL injection",
            "file": "app.py",
            "line": 42
        }"#;
        let finding: AgentFinding = serde_json::from_str(json).unwrap();
        assert_eq!(finding.severity, Severity::High);
        assert!(finding.fix.is_none());
        assert_eq!(finding.confidence, 0.0);
    }
}
