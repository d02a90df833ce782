// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock scanning agent for deterministic testing.
//!
//! `MockAgent` implements `SecurityAgent` with canned findings, switchable
//! health and scan failures, an optional scan delay, and call counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use agentscan_core::AgentscanError;
use agentscan_core::traits::SecurityAgent;
use agentscan_core::types::{
    AgentConfig, AgentFinding, ScanConfig, ScanMetadata, ScanOutput, Severity, VulnCategory,
};
use async_trait::async_trait;

/// A mock agent that returns pre-configured findings.
pub struct MockAgent {
    name: String,
    languages: Vec<String>,
    categories: Vec<VulnCategory>,
    findings: Vec<AgentFinding>,
    delay: Duration,
    healthy: AtomicBool,
    fail_scans: AtomicBool,
    scan_calls: AtomicUsize,
    health_calls: AtomicUsize,
}

impl MockAgent {
    /// A healthy agent with no findings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            languages: Vec::new(),
            categories: Vec::new(),
            findings: Vec::new(),
            delay: Duration::ZERO,
            healthy: AtomicBool::new(true),
            fail_scans: AtomicBool::new(false),
            scan_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_findings(mut self, findings: Vec<AgentFinding>) -> Self {
        self.findings = findings;
        self
    }

    /// Report `count` generated findings on every scan.
    pub fn with_finding_count(self, count: usize) -> Self {
        let tool = self.name.clone();
        let findings = (0..count)
            .map(|n| sample_finding(&tool, &format!("{tool}.rule-{n}"), n as u32 + 1))
            .collect();
        self.with_findings(findings)
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_categories(mut self, categories: &[VulnCategory]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    /// Sleep this long inside every scan.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self) -> Self {
        self.fail_scans.store(true, Ordering::SeqCst);
        self
    }

    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_scans.store(failing, Ordering::SeqCst);
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecurityAgent for MockAgent {
    async fn scan(&self, config: &ScanConfig) -> Result<ScanOutput, AgentscanError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(AgentscanError::Agent {
                agent: self.name.clone(),
                message: format!("scan of {} failed", config.repo_url),
            });
        }
        Ok(ScanOutput {
            agent: self.name.clone(),
            findings: self.findings.clone(),
            metadata: ScanMetadata {
                tool_version: "0.1.0".into(),
                files_scanned: config.files.len() as u64,
                exit_code: 0,
                command_line: None,
            },
            duration: self.delay,
        })
    }

    async fn health_check(&self) -> Result<(), AgentscanError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgentscanError::Agent {
                agent: self.name.clone(),
                message: "tool not available".into(),
            })
        }
    }

    fn config(&self) -> AgentConfig {
        AgentConfig {
            name: self.name.clone(),
            version: "0.1.0".into(),
            supported_languages: self.languages.clone(),
            categories: self.categories.clone(),
            requires_docker: false,
            default_timeout: Duration::from_secs(60),
            max_memory_mb: None,
            max_cpu_cores: None,
        }
    }
}

/// A high-severity SQL injection finding at `app.py:<line>`.
pub fn sample_finding(tool: &str, rule_id: &str, line: u32) -> AgentFinding {
    AgentFinding {
        tool: tool.to_string(),
        rule_id: rule_id.to_string(),
        severity: Severity::High,
        category: VulnCategory::SqlInjection,
        title: "SQL injection".to_string(),
        description: "user input reaches a raw query".to_string(),
        file: "app.py".to_string(),
        line,
        column: Some(1),
        code: Some("cursor.execute(query % name)".to_string()),
        fix: None,
        confidence: 0.8,
        references: vec!["CWE-89".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_calls_and_returns_findings() {
        let agent = MockAgent::new("semgrep").with_finding_count(2);
        let output = agent.scan(&ScanConfig::default()).await.unwrap();
        assert_eq!(output.findings.len(), 2);
        assert_eq!(output.findings[0].tool, "semgrep");
        agent.health_check().await.unwrap();
        assert_eq!(agent.scan_calls(), 1);
        assert_eq!(agent.health_calls(), 1);
    }

    #[tokio::test]
    async fn failures_can_be_toggled() {
        let agent = MockAgent::new("bandit").failing().unhealthy();
        assert!(agent.scan(&ScanConfig::default()).await.is_err());
        assert!(agent.health_check().await.is_err());

        agent.set_failing(false);
        agent.set_healthy(true);
        assert!(agent.scan(&ScanConfig::default()).await.is_ok());
        assert!(agent.health_check().await.is_ok());
    }
}
