// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent manager behavior against mock agents: health gating, fan-out
//! partial failure, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use agentscan_agents::AgentManager;
use agentscan_core::AgentscanError;
use agentscan_core::types::{HealthState, ScanConfig, VulnCategory};
use agentscan_test_utils::MockAgent;
use tokio_util::sync::CancellationToken;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn failed_health_check_blocks_scan_without_invoking_agent() {
    let manager = AgentManager::default();
    let agent = Arc::new(MockAgent::new("semgrep").unhealthy());
    manager
        .register_agent("semgrep", agent.clone())
        .await
        .unwrap();

    assert!(manager.health_check("semgrep").await.is_err());
    let err = manager
        .execute_scan("semgrep", &ScanConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentscanError::AgentUnhealthy { .. }));
    assert_eq!(agent.scan_calls(), 0);
    let health = manager.agent_health("semgrep").await.unwrap();
    assert_eq!(health.status, HealthState::Unhealthy);
    assert_eq!(health.check_count, 2);
    assert_eq!(health.failure_count, 2);
}

#[tokio::test]
async fn recovered_agent_scans_again() {
    let manager = AgentManager::default();
    let agent = Arc::new(MockAgent::new("bandit").unhealthy().with_finding_count(1));
    manager.register_agent("bandit", agent.clone()).await.unwrap();
    assert!(manager.execute_scan("bandit", &ScanConfig::default()).await.is_err());

    agent.set_healthy(true);
    let output = manager
        .execute_scan("bandit", &ScanConfig::default())
        .await
        .unwrap();
    assert_eq!(output.findings.len(), 1);
    assert_eq!(
        manager.agent_health("bandit").await.unwrap().status,
        HealthState::Healthy
    );
}

#[tokio::test]
async fn scan_failure_is_recorded_in_health() {
    let manager = AgentManager::default();
    let agent = Arc::new(MockAgent::new("eslint").failing());
    manager.register_agent("eslint", agent.clone()).await.unwrap();

    let err = manager
        .execute_scan("eslint", &ScanConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentscanError::Agent { .. }));

    let health = manager.agent_health("eslint").await.unwrap();
    assert_eq!(health.status, HealthState::Unhealthy);
    assert_eq!(health.check_count, 1);
    assert_eq!(health.failure_count, 1);
    assert!(health.last_error.unwrap().contains("failed"));
}

#[tokio::test]
async fn slow_health_probe_times_out() {
    struct Hanging;

    #[async_trait::async_trait]
    impl agentscan_core::traits::SecurityAgent for Hanging {
        async fn scan(
            &self,
            _config: &ScanConfig,
        ) -> Result<agentscan_core::types::ScanOutput, AgentscanError> {
            Err(AgentscanError::Internal("unreachable".into()))
        }

        async fn health_check(&self) -> Result<(), AgentscanError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        fn config(&self) -> agentscan_core::types::AgentConfig {
            agentscan_core::types::AgentConfig::default()
        }
    }

    let manager = AgentManager::new(Duration::from_millis(20));
    manager.register_agent("hanging", Arc::new(Hanging)).await.unwrap();
    let err = manager.health_check("hanging").await.unwrap_err();
    assert!(matches!(err, AgentscanError::HealthCheckFailed { .. }));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn fan_out_isolates_a_failing_agent() {
    let manager = Arc::new(AgentManager::default());
    manager
        .register_agent("a", Arc::new(MockAgent::new("a").with_finding_count(2)))
        .await
        .unwrap();
    manager
        .register_agent("b", Arc::new(MockAgent::new("b").failing()))
        .await
        .unwrap();
    manager
        .register_agent("c", Arc::new(MockAgent::new("c").with_finding_count(1)))
        .await
        .unwrap();

    let fan_out = manager
        .execute_parallel_scans(
            &names(&["a", "b", "c"]),
            &ScanConfig::default(),
            &CancellationToken::new(),
        )
        .await;

    let mut succeeded: Vec<&str> = fan_out.succeeded.keys().map(String::as_str).collect();
    succeeded.sort();
    assert_eq!(succeeded, vec!["a", "c"]);
    assert!(fan_out.failed.contains_key("b"));
    assert!(fan_out.last_error.is_some());
    assert!(fan_out.unfinished.is_empty());
    assert!(!fan_out.is_total_failure());
}

#[tokio::test]
async fn fan_out_with_every_agent_failing_is_total_failure() {
    let manager = Arc::new(AgentManager::default());
    manager
        .register_agent("a", Arc::new(MockAgent::new("a").failing()))
        .await
        .unwrap();

    let fan_out = manager
        .execute_parallel_scans(
            &names(&["a", "missing"]),
            &ScanConfig::default(),
            &CancellationToken::new(),
        )
        .await;
    assert!(fan_out.is_total_failure());
    assert_eq!(fan_out.failed.len(), 2);
}

#[tokio::test]
async fn cancellation_returns_partial_results_at_once() {
    let manager = Arc::new(AgentManager::default());
    manager
        .register_agent("fast", Arc::new(MockAgent::new("fast")))
        .await
        .unwrap();
    let slow = Arc::new(MockAgent::new("slow").with_delay(Duration::from_secs(30)));
    manager.register_agent("slow", slow.clone()).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let fan_out = manager
        .execute_parallel_scans(&names(&["fast", "slow"]), &ScanConfig::default(), &cancel)
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(fan_out.was_cancelled());
    assert!(fan_out.succeeded.contains_key("fast"));
    assert_eq!(fan_out.unfinished, vec!["slow".to_string()]);
    // The slow scan was started and is not aborted.
    assert_eq!(slow.scan_calls(), 1);
}

#[tokio::test]
async fn capability_queries_intersect_declared_sets() {
    let manager = AgentManager::default();
    manager
        .register_agent(
            "semgrep",
            Arc::new(
                MockAgent::new("semgrep")
                    .with_languages(&["python", "javascript"])
                    .with_categories(&[VulnCategory::SqlInjection, VulnCategory::Xss]),
            ),
        )
        .await
        .unwrap();
    manager
        .register_agent(
            "gitleaks",
            Arc::new(MockAgent::new("gitleaks").with_categories(&[VulnCategory::HardcodedSecrets])),
        )
        .await
        .unwrap();

    assert_eq!(
        manager
            .get_agents_for_languages(&names(&["JavaScript"]))
            .await,
        names(&["semgrep"])
    );
    assert_eq!(
        manager
            .get_agents_for_categories(&[VulnCategory::HardcodedSecrets, VulnCategory::Xss])
            .await,
        names(&["gitleaks", "semgrep"])
    );
    assert!(manager.get_agents_for_languages(&names(&["rust"])).await.is_empty());
}
