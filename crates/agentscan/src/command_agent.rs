// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scanning agents backed by external executables.
//!
//! A command agent runs its configured program once per scan. Scan
//! parameters are passed through `AGENTSCAN_*` environment variables and the
//! program prints a JSON report on stdout:
//!
//! ```json
//! {"tool_version": "1.2.0", "files_scanned": 40, "findings": [ ... ]}
//! ```
//!
//! Findings that omit `tool` are attributed to the agent. The report is
//! accepted whatever the exit status, since many scanners exit non-zero when
//! they find something; a non-zero exit without a parseable report is a
//! scan failure.

use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};

use agentscan_config::model::CommandAgentConfig;
use agentscan_core::AgentscanError;
use agentscan_core::traits::SecurityAgent;
use agentscan_core::types::{
    AgentConfig, AgentFinding, ScanConfig, ScanMetadata, ScanOutput, VulnCategory,
};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 512;

#[derive(Debug, Deserialize)]
struct CommandReport {
    #[serde(default)]
    tool_version: Option<String>,
    #[serde(default)]
    files_scanned: Option<u64>,
    findings: Vec<serde_json::Value>,
}

/// An agent that shells out to a scanner binary.
#[derive(Debug)]
pub struct CommandAgent {
    command: String,
    args: Vec<String>,
    health_args: Vec<String>,
    timeout: Duration,
    config: AgentConfig,
}

impl CommandAgent {
    pub fn from_config(config: &CommandAgentConfig) -> Result<Self, AgentscanError> {
        let categories = config
            .categories
            .iter()
            .map(|name| {
                VulnCategory::from_str(name).map_err(|_| {
                    AgentscanError::Config(format!(
                        "agent `{}` declares unknown category `{name}`",
                        config.name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            command: config.command.clone(),
            args: config.args.clone(),
            health_args: config.health_args.clone(),
            timeout,
            config: AgentConfig {
                name: config.name.clone(),
                version: String::new(),
                supported_languages: config.languages.clone(),
                categories,
                requires_docker: config.requires_docker,
                default_timeout: timeout,
                max_memory_mb: None,
                max_cpu_cores: None,
            },
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn error(&self, message: impl Into<String>) -> AgentscanError {
        AgentscanError::Agent {
            agent: self.name().to_string(),
            message: message.into(),
        }
    }

    /// The shorter of the agent's own timeout and the scan's deadline.
    fn effective_timeout(&self, scan: &ScanConfig) -> Duration {
        if scan.timeout.is_zero() {
            self.timeout
        } else {
            self.timeout.min(scan.timeout)
        }
    }

    fn scan_command(&self, scan: &ScanConfig) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env("AGENTSCAN_AGENT", self.name())
            .env("AGENTSCAN_REPO_URL", &scan.repo_url)
            .env("AGENTSCAN_BRANCH", &scan.branch)
            .env("AGENTSCAN_COMMIT", &scan.commit)
            .env("AGENTSCAN_FILES", scan.files.join("\n"))
            .env("AGENTSCAN_LANGUAGES", scan.languages.join(","))
            .env("AGENTSCAN_RULES", scan.rules.join(","));
        for (key, value) in &scan.options {
            cmd.env(format!("AGENTSCAN_OPT_{}", env_key(key)), value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Turn a report's raw findings into typed findings owned by this agent.
    fn parse_findings(&self, raw: Vec<serde_json::Value>) -> Result<Vec<AgentFinding>, AgentscanError> {
        raw.into_iter()
            .enumerate()
            .map(|(i, mut value)| {
                if let Some(object) = value.as_object_mut() {
                    object
                        .entry("tool")
                        .or_insert_with(|| self.name().into());
                }
                serde_json::from_value(value)
                    .map_err(|e| self.error(format!("finding {i} is malformed: {e}")))
            })
            .collect()
    }
}

#[async_trait]
impl SecurityAgent for CommandAgent {
    async fn scan(&self, scan: &ScanConfig) -> Result<ScanOutput, AgentscanError> {
        let started = Instant::now();
        let timeout = self.effective_timeout(scan);
        debug!(agent = self.name(), command = %self.command, "running scan command");

        let output = tokio::time::timeout(timeout, self.scan_command(scan).output())
            .await
            .map_err(|_| AgentscanError::Timeout { duration: timeout })?
            .map_err(|e| self.error(format!("failed to run {}: {e}", self.command)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let report: CommandReport = match serde_json::from_slice(&output.stdout) {
            Ok(report) => report,
            Err(e) if output.status.success() => {
                return Err(self.error(format!("unreadable report: {e}")));
            }
            Err(_) => {
                return Err(self.error(format!(
                    "exited with status {exit_code}: {}",
                    stderr_excerpt(&output.stderr)
                )));
            }
        };

        let findings = self.parse_findings(report.findings)?;
        Ok(ScanOutput {
            agent: self.name().to_string(),
            findings,
            metadata: ScanMetadata {
                tool_version: report.tool_version.unwrap_or_default(),
                files_scanned: report.files_scanned.unwrap_or(scan.files.len() as u64),
                exit_code,
                command_line: Some(self.command_line()),
            },
            duration: started.elapsed(),
        })
    }

    async fn health_check(&self) -> Result<(), AgentscanError> {
        let output = Command::new(&self.command)
            .args(&self.health_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.error(format!("failed to run {}: {e}", self.command)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(self.error(format!(
                "health probe exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            )))
        }
    }

    fn config(&self) -> AgentConfig {
        self.config.clone()
    }
}

/// `max-depth` becomes `MAX_DEPTH`.
fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_agent(script: &str) -> CommandAgent {
        CommandAgent::from_config(&CommandAgentConfig {
            name: "shell".into(),
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            health_args: vec!["-c".into(), "exit 0".into()],
            languages: vec!["python".into()],
            categories: vec!["sql_injection".into()],
            requires_docker: false,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn unknown_category_is_a_config_error() {
        let err = CommandAgent::from_config(&CommandAgentConfig {
            name: "bad".into(),
            command: "true".into(),
            args: vec![],
            health_args: vec![],
            languages: vec![],
            categories: vec!["sqli".into()],
            requires_docker: false,
            timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, AgentscanError::Config(_)));
    }

    #[test]
    fn option_keys_become_env_names() {
        assert_eq!(env_key("max-depth"), "MAX_DEPTH");
        assert_eq!(env_key("base_sha"), "BASE_SHA");
    }

    #[test]
    fn declared_capabilities_come_from_config() {
        let agent = shell_agent("true");
        let config = agent.config();
        assert_eq!(config.name, "shell");
        assert_eq!(config.categories, vec![VulnCategory::SqlInjection]);
        assert_eq!(config.default_timeout, Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn report_on_stdout_becomes_findings() {
        let agent = shell_agent(
            r#"printf '{"tool_version":"9.9","findings":[{"rule_id":"r1","severity":"high","category":"xss","title":"XSS","file":"%s","line":3}]}' "$AGENTSCAN_BRANCH""#,
        );
        let scan = ScanConfig {
            branch: "main".into(),
            timeout: Duration::from_secs(5),
            ..ScanConfig::default()
        };
        let output = agent.scan(&scan).await.unwrap();
        assert_eq!(output.agent, "shell");
        assert_eq!(output.metadata.tool_version, "9.9");
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].tool, "shell");
        assert_eq!(output.findings[0].file, "main");
        assert_eq!(output.findings[0].category, VulnCategory::Xss);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_with_report_is_accepted() {
        let agent = shell_agent(r#"echo '{"findings":[]}'; exit 1"#);
        let output = agent.scan(&ScanConfig::default()).await.unwrap();
        assert_eq!(output.metadata.exit_code, 1);
        assert!(output.findings.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_without_report_fails() {
        let agent = shell_agent("echo boom >&2; exit 3");
        let err = agent.scan(&ScanConfig::default()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("status 3"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let agent = shell_agent("sleep 5");
        let scan = ScanConfig {
            timeout: Duration::from_millis(100),
            ..ScanConfig::default()
        };
        let err = agent.scan(&scan).await.unwrap_err();
        assert!(matches!(err, AgentscanError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn health_probe_reflects_exit_status() {
        let healthy = shell_agent("true");
        healthy.health_check().await.unwrap();

        let mut broken = shell_agent("true");
        broken.health_args = vec!["-c".into(), "exit 2".into()];
        assert!(broken.health_check().await.is_err());

        let mut missing = shell_agent("true");
        missing.command = "/nonexistent/agentscan-tool".into();
        assert!(missing.health_check().await.is_err());
    }
}
