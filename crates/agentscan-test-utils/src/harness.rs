// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end orchestration tests.
//!
//! `TestHarness` assembles an agent manager, a fault-injectable queue, a
//! scan repository (in memory or on a temp SQLite file), and an
//! orchestration service tuned for fast polling.

use std::sync::Arc;
use std::time::Duration;

use agentscan_agents::AgentManager;
use agentscan_core::AgentscanError;
use agentscan_core::traits::{JobQueue, ScanRepository, SecurityAgent};
use agentscan_orchestrator::{
    OrchestrationService, ScanRequest, ScanStatusReport, ServiceSettings,
};
use agentscan_queue::QueueSettings;
use agentscan_storage::{Database, SqliteJobQueue, SqliteScanRepository};
use uuid::Uuid;

use crate::faulty_queue::FaultyQueue;
use crate::memory_repository::MemoryScanRepository;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    agents: Vec<(String, Arc<dyn SecurityAgent>)>,
    settings: ServiceSettings,
    queue_settings: QueueSettings,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            agents: Vec::new(),
            settings: ServiceSettings {
                worker_count: 2,
                poll_interval: Duration::from_millis(10),
                health_check_interval: Duration::from_secs(60),
                cleanup_interval: Duration::from_secs(60),
                shutdown_timeout: Duration::from_secs(5),
                default_scan_timeout: Duration::from_secs(5),
                max_attempts: 1,
                retry_delay: Duration::from_millis(50),
            },
            queue_settings: QueueSettings::default(),
            sqlite: false,
        }
    }

    /// Register an agent under `name` when the harness is built.
    pub fn with_agent(mut self, name: &str, agent: Arc<dyn SecurityAgent>) -> Self {
        self.agents.push((name.to_string(), agent));
        self
    }

    pub fn with_workers(mut self, count: usize) -> Self {
        self.settings.worker_count = count;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.settings.max_attempts = max_attempts;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.settings.default_scan_timeout = timeout;
        self
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_queue_settings(mut self, settings: QueueSettings) -> Self {
        self.queue_settings = settings;
        self
    }

    /// Back the queue and repository with a temp SQLite database.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, AgentscanError> {
        let agents = Arc::new(AgentManager::new(Duration::from_secs(2)));
        for (name, agent) in self.agents {
            agents.register_agent(name, agent).await?;
        }

        let (queue, repository, temp_dir): (
            Arc<FaultyQueue>,
            Arc<dyn ScanRepository>,
            Option<tempfile::TempDir>,
        ) = if self.sqlite {
            let temp_dir = tempfile::TempDir::new().map_err(AgentscanError::storage)?;
            let path = temp_dir.path().join("agentscan.db");
            let db = Database::open(&path.to_string_lossy()).await?;
            let inner: Arc<dyn JobQueue> =
                Arc::new(SqliteJobQueue::new(db.clone(), self.queue_settings));
            (
                Arc::new(FaultyQueue::new(inner)),
                Arc::new(SqliteScanRepository::new(db)),
                Some(temp_dir),
            )
        } else {
            (
                Arc::new(FaultyQueue::memory(self.queue_settings)),
                Arc::new(MemoryScanRepository::new()),
                None,
            )
        };

        let service = Arc::new(OrchestrationService::new(
            Arc::clone(&repository),
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            Arc::clone(&agents),
            self.settings,
        ));

        Ok(TestHarness {
            service,
            agents,
            queue,
            repository,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete orchestration environment for assertions.
pub struct TestHarness {
    pub service: Arc<OrchestrationService>,
    pub agents: Arc<AgentManager>,
    /// The queue the service uses; flip its fault switches to simulate outages.
    pub queue: Arc<FaultyQueue>,
    pub repository: Arc<dyn ScanRepository>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Poll a scan until it reaches a terminal state or `timeout` passes.
    pub async fn wait_for_terminal(
        &self,
        scan_id: Uuid,
        timeout: Duration,
    ) -> Result<ScanStatusReport, AgentscanError> {
        let id = scan_id.to_string();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.service.get_scan_status(&id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AgentscanError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// A valid full-scan request for `agents` at `priority`.
pub fn scan_request(agents: &[&str], priority: i32) -> ScanRequest {
    ScanRequest {
        repository_id: Uuid::new_v4(),
        user_id: Some(Uuid::new_v4()),
        repo_url: "https://example.com/acme/app.git".to_string(),
        branch: "main".to_string(),
        commit_sha: "4b825dc642cb6eb9a060e54bf8d69288fbee4904".to_string(),
        scan_type: "full".to_string(),
        priority,
        agents: agents.iter().map(|a| a.to_string()).collect(),
        ..ScanRequest::default()
    }
}
