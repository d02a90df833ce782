// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent registry with health tracking and parallel scan fan-out.
//!
//! Registrations and health records live behind one `RwLock`. The lock is
//! only held to copy state in or out; agent calls always run unlocked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agentscan_config::model::AgentManagerConfig;
use agentscan_core::AgentscanError;
use agentscan_core::traits::SecurityAgent;
use agentscan_core::types::{
    AgentConfig, AgentHealth, HealthState, ScanConfig, ScanOutput, VulnCategory,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default bound on a single health probe.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

struct AgentEntry {
    agent: Arc<dyn SecurityAgent>,
    config: AgentConfig,
    health: AgentHealth,
    registered_at: DateTime<Utc>,
}

/// Snapshot of one registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub config: AgentConfig,
    pub health: AgentHealth,
    pub registered_at: DateTime<Utc>,
}

/// Registry-wide counts for observability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentManagerStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub unknown: usize,
    pub uptime: Duration,
    /// Every registration, sorted by name.
    pub agents: Vec<AgentInfo>,
}

/// Outcome of a parallel scan across several agents.
#[derive(Debug, Default)]
pub struct FanOut {
    pub succeeded: HashMap<String, ScanOutput>,
    /// Error message per failed agent.
    pub failed: HashMap<String, String>,
    /// Agents that had not reported when the fan-out was cancelled, sorted.
    pub unfinished: Vec<String>,
    /// The most recent error seen, including cancellation.
    pub last_error: Option<AgentscanError>,
}

impl FanOut {
    /// No agent succeeded and at least one error was seen.
    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty() && self.last_error.is_some()
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.last_error, Some(AgentscanError::Cancelled))
    }
}

/// Registry of scanning agents.
pub struct AgentManager {
    agents: RwLock<HashMap<String, AgentEntry>>,
    health_timeout: Duration,
    started_at: Instant,
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_CHECK_TIMEOUT)
    }
}

impl AgentManager {
    pub fn new(health_timeout: Duration) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            health_timeout,
            started_at: Instant::now(),
        }
    }

    pub fn from_config(config: &AgentManagerConfig) -> Self {
        Self::new(config.health_check_timeout())
    }

    /// Register an agent under a unique, non-empty name.
    ///
    /// The agent's capability config is captured once here; health starts
    /// out `unknown`.
    pub async fn register_agent(
        &self,
        name: impl Into<String>,
        agent: Arc<dyn SecurityAgent>,
    ) -> Result<(), AgentscanError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AgentscanError::Validation(
                "agent name must not be empty".into(),
            ));
        }

        let config = agent.config();
        let mut agents = self.agents.write().await;
        if agents.contains_key(&name) {
            return Err(AgentscanError::Conflict(format!(
                "agent {name} is already registered"
            )));
        }
        info!(agent = %name, version = %config.version, "agent registered");
        agents.insert(
            name,
            AgentEntry {
                agent,
                config,
                health: AgentHealth::default(),
                registered_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub async fn unregister_agent(&self, name: &str) -> Result<(), AgentscanError> {
        match self.agents.write().await.remove(name) {
            Some(_) => {
                info!(agent = name, "agent unregistered");
                Ok(())
            }
            None => Err(AgentscanError::not_found("agent", name)),
        }
    }

    pub async fn get_agent(&self, name: &str) -> Result<Arc<dyn SecurityAgent>, AgentscanError> {
        self.agents
            .read()
            .await
            .get(name)
            .map(|entry| Arc::clone(&entry.agent))
            .ok_or_else(|| AgentscanError::not_found("agent", name))
    }

    /// Registered agent names, sorted.
    pub async fn list_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn agent_info(&self, name: &str) -> Result<AgentInfo, AgentscanError> {
        self.agents
            .read()
            .await
            .get(name)
            .map(|entry| info_of(name, entry))
            .ok_or_else(|| AgentscanError::not_found("agent", name))
    }

    pub async fn agent_config(&self, name: &str) -> Result<AgentConfig, AgentscanError> {
        Ok(self.agent_info(name).await?.config)
    }

    pub async fn agent_health(&self, name: &str) -> Result<AgentHealth, AgentscanError> {
        Ok(self.agent_info(name).await?.health)
    }

    /// Probe one agent under the health timeout and record the outcome.
    pub async fn health_check(&self, name: &str) -> Result<(), AgentscanError> {
        let agent = self.get_agent(name).await?;

        let result = match tokio::time::timeout(self.health_timeout, agent.health_check()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AgentscanError::HealthCheckFailed {
                name: name.to_string(),
                source: Box::new(e),
            }),
            Err(_) => Err(AgentscanError::HealthCheckFailed {
                name: name.to_string(),
                source: Box::new(AgentscanError::Timeout {
                    duration: self.health_timeout,
                }),
            }),
        };

        let now = Utc::now();
        if let Some(entry) = self.agents.write().await.get_mut(name) {
            match &result {
                Ok(()) => entry.health.record_success(now),
                Err(e) => entry.health.record_failure(now, e.to_string()),
            }
        }
        agentscan_prometheus::set_agent_health(name, result.is_ok());
        debug!(agent = name, healthy = result.is_ok(), "health check finished");
        result
    }

    /// Probe every agent. Never stops early; returns the last error seen.
    pub async fn health_check_all(&self) -> Result<(), AgentscanError> {
        let mut last_error = None;
        for name in self.list_agents().await {
            if let Err(e) = self.health_check(&name).await {
                warn!(agent = %name, error = %e, "agent health check failed");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run one scan after a fresh health check.
    ///
    /// Unhealthy agents fail fast without being invoked. A scan failure is
    /// recorded into the agent's health before it is returned.
    pub async fn execute_scan(
        &self,
        name: &str,
        config: &ScanConfig,
    ) -> Result<ScanOutput, AgentscanError> {
        match self.health_check(name).await {
            Ok(()) => {}
            Err(e @ AgentscanError::NotFound { .. }) => return Err(e),
            Err(e) => {
                return Err(AgentscanError::AgentUnhealthy {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        let agent = self.get_agent(name).await?;
        let started = Instant::now();
        match agent.scan(config).await {
            Ok(output) => {
                agentscan_prometheus::record_agent_scan(name, "completed");
                debug!(
                    agent = name,
                    findings = output.findings.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "agent scan finished"
                );
                Ok(output)
            }
            Err(e) => {
                agentscan_prometheus::record_agent_scan(name, "failed");
                if let Some(entry) = self.agents.write().await.get_mut(name) {
                    entry.health.record_scan_failure(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Scan with every distinct requested agent concurrently.
    ///
    /// Each agent runs in its own task and reports over a channel; one
    /// agent's failure never affects the others. When `cancel` fires first,
    /// the partial outcome is returned at once with a cancellation error and
    /// the remaining tasks are left to finish on their own.
    pub async fn execute_parallel_scans(
        self: &Arc<Self>,
        names: &[String],
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> FanOut {
        let mut seen = HashSet::new();
        let requested: Vec<String> = names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        let mut fan_out = FanOut::default();
        if requested.is_empty() {
            return fan_out;
        }

        let (tx, mut rx) = mpsc::channel(requested.len());
        for name in &requested {
            let manager = Arc::clone(self);
            let tx = tx.clone();
            let name = name.clone();
            let config = config.clone();
            tokio::spawn(async move {
                let result = manager.execute_scan(&name, &config).await;
                // The receiver is gone when the fan-out was cancelled.
                let _ = tx.send((name, result)).await;
            });
        }
        drop(tx);

        let mut pending: HashSet<String> = requested.iter().cloned().collect();
        while !pending.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    fan_out.last_error = Some(AgentscanError::Cancelled);
                    break;
                }
                received = rx.recv() => {
                    let Some((name, result)) = received else { break };
                    pending.remove(&name);
                    match result {
                        Ok(output) => {
                            fan_out.succeeded.insert(name, output);
                        }
                        Err(e) => {
                            warn!(agent = %name, error = %e, "agent scan failed");
                            fan_out.failed.insert(name, e.to_string());
                            fan_out.last_error = Some(e);
                        }
                    }
                }
            }
        }

        let mut unfinished: Vec<String> = pending.into_iter().collect();
        unfinished.sort();
        fan_out.unfinished = unfinished;
        fan_out
    }

    /// Agents supporting at least one of `languages` (case-insensitive), sorted.
    pub async fn get_agents_for_languages(&self, languages: &[String]) -> Vec<String> {
        self.matching(|config| config.supports_any_language(languages))
            .await
    }

    /// Agents covering at least one of `categories`, sorted.
    pub async fn get_agents_for_categories(&self, categories: &[VulnCategory]) -> Vec<String> {
        self.matching(|config| config.covers_any_category(categories))
            .await
    }

    async fn matching(&self, predicate: impl Fn(&AgentConfig) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .agents
            .read()
            .await
            .iter()
            .filter(|(_, entry)| predicate(&entry.config))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Fails when no agent is registered or none is currently healthy.
    pub async fn health(&self) -> Result<(), AgentscanError> {
        let agents = self.agents.read().await;
        if agents.is_empty() {
            return Err(AgentscanError::Unavailable("no agents registered".into()));
        }
        if !agents
            .values()
            .any(|entry| entry.health.status == HealthState::Healthy)
        {
            return Err(AgentscanError::Unavailable("no healthy agents".into()));
        }
        Ok(())
    }

    pub async fn stats(&self) -> AgentManagerStats {
        let agents = self.agents.read().await;
        let mut infos: Vec<AgentInfo> = agents
            .iter()
            .map(|(name, entry)| info_of(name, entry))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));

        let count = |state: HealthState| {
            infos
                .iter()
                .filter(|info| info.health.status == state)
                .count()
        };
        AgentManagerStats {
            total: infos.len(),
            healthy: count(HealthState::Healthy),
            unhealthy: count(HealthState::Unhealthy),
            unknown: count(HealthState::Unknown),
            uptime: self.started_at.elapsed(),
            agents: infos,
        }
    }
}

fn info_of(name: &str, entry: &AgentEntry) -> AgentInfo {
    AgentInfo {
        name: name.to_string(),
        config: entry.config.clone(),
        health: entry.health.clone(),
        registered_at: entry.registered_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    /// Minimal agent whose health and scan outcome are fixed at construction.
    struct StubAgent {
        healthy: bool,
        languages: Vec<String>,
    }

    impl StubAgent {
        fn healthy(languages: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                healthy: true,
                languages: languages.iter().map(|l| l.to_string()).collect(),
            })
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self {
                healthy: false,
                languages: Vec::new(),
            })
        }
    }

    #[async_trait]
    impl SecurityAgent for StubAgent {
        async fn scan(&self, _config: &ScanConfig) -> Result<ScanOutput, AgentscanError> {
            Ok(ScanOutput {
                agent: "stub".into(),
                findings: Vec::new(),
                metadata: Default::default(),
                duration: Duration::ZERO,
            })
        }

        async fn health_check(&self) -> Result<(), AgentscanError> {
            if self.healthy {
                Ok(())
            } else {
                Err(AgentscanError::Internal("binary missing".into()))
            }
        }

        fn config(&self) -> AgentConfig {
            AgentConfig {
                name: "stub".into(),
                version: "1.0.0".into(),
                supported_languages: self.languages.clone(),
                ..AgentConfig::default()
            }
        }
    }

    #[tokio::test]
    async fn registration_rejects_empty_and_duplicate_names() {
        let manager = AgentManager::default();
        let err = manager
            .register_agent("  ", StubAgent::healthy(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentscanError::Validation(_)));

        manager
            .register_agent("semgrep", StubAgent::healthy(&[]))
            .await
            .unwrap();
        let err = manager
            .register_agent("semgrep", StubAgent::healthy(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentscanError::Conflict(_)));
    }

    #[tokio::test]
    async fn new_registration_has_unknown_health() {
        let manager = AgentManager::default();
        manager
            .register_agent("semgrep", StubAgent::healthy(&["python"]))
            .await
            .unwrap();
        let health = manager.agent_health("semgrep").await.unwrap();
        assert_eq!(health.status, HealthState::Unknown);
        assert_eq!(health.check_count, 0);
        assert_eq!(
            manager.agent_config("semgrep").await.unwrap().version,
            "1.0.0"
        );
    }

    #[tokio::test]
    async fn unregister_removes_agent() {
        let manager = AgentManager::default();
        manager
            .register_agent("semgrep", StubAgent::healthy(&[]))
            .await
            .unwrap();
        manager.unregister_agent("semgrep").await.unwrap();
        assert!(manager.list_agents().await.is_empty());
        assert!(matches!(
            manager.unregister_agent("semgrep").await.unwrap_err(),
            AgentscanError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn language_lookup_is_case_insensitive_and_sorted() {
        let manager = AgentManager::default();
        manager
            .register_agent("semgrep", StubAgent::healthy(&["Python", "Go"]))
            .await
            .unwrap();
        manager
            .register_agent("bandit", StubAgent::healthy(&["python"]))
            .await
            .unwrap();
        manager
            .register_agent("gosec", StubAgent::healthy(&["go"]))
            .await
            .unwrap();

        assert_eq!(
            manager
                .get_agents_for_languages(&["PYTHON".to_string()])
                .await,
            vec!["bandit".to_string(), "semgrep".to_string()]
        );
    }

    #[tokio::test]
    async fn health_requires_a_healthy_agent() {
        let manager = AgentManager::default();
        assert!(matches!(
            manager.health().await.unwrap_err(),
            AgentscanError::Unavailable(_)
        ));

        manager
            .register_agent("semgrep", StubAgent::healthy(&[]))
            .await
            .unwrap();
        // Registered but never checked: still unknown.
        assert!(manager.health().await.is_err());

        manager.health_check("semgrep").await.unwrap();
        manager.health().await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn sweep_checks_every_agent_and_reports_last_error() {
        let manager = AgentManager::default();
        manager
            .register_agent("a-broken", StubAgent::broken())
            .await
            .unwrap();
        manager
            .register_agent("b-ok", StubAgent::healthy(&[]))
            .await
            .unwrap();

        let err = manager.health_check_all().await.unwrap_err();
        assert!(matches!(err, AgentscanError::HealthCheckFailed { .. }));
        assert!(logs_contain("agent health check failed"));

        let stats = manager.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.healthy, 1);
        assert_eq!(stats.unhealthy, 1);
        assert_eq!(stats.unknown, 0);
        assert_eq!(stats.agents[0].name, "a-broken");
        assert_eq!(stats.agents[0].health.failure_count, 1);
    }

    #[tokio::test]
    async fn unhealthy_agent_is_refused() {
        let manager = AgentManager::default();
        manager
            .register_agent("broken", StubAgent::broken())
            .await
            .unwrap();
        let err = manager
            .execute_scan("broken", &ScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentscanError::AgentUnhealthy { .. }));
    }

    #[tokio::test]
    async fn unknown_agent_scan_is_not_found() {
        let manager = AgentManager::default();
        let err = manager
            .execute_scan("ghost", &ScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentscanError::NotFound { .. }));
    }

    #[tokio::test]
    async fn fan_out_dedupes_requested_names() {
        let manager = Arc::new(AgentManager::default());
        manager
            .register_agent("semgrep", StubAgent::healthy(&[]))
            .await
            .unwrap();
        let names = vec!["semgrep".to_string(), "semgrep".to_string()];
        let fan_out = manager
            .execute_parallel_scans(&names, &ScanConfig::default(), &CancellationToken::new())
            .await;
        assert_eq!(fan_out.succeeded.len(), 1);
        assert!(fan_out.failed.is_empty());
        assert!(fan_out.last_error.is_none());
        assert!(!fan_out.is_total_failure());
    }
}
