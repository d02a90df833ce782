// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestration service: scan submission, inspection, and the
//! lifecycle of the worker pool and maintenance loops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentscan_agents::AgentManager;
use agentscan_config::AgentscanConfig;
use agentscan_core::AgentscanError;
use agentscan_core::traits::{JobQueue, ScanRepository};
use agentscan_core::types::{
    FindingFilter, JobId, JobStatus, Pagination, Priority, QueueJob, ScanFilter, ScanJob,
    ScanJobStatus, ScanType,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::payload::{SCAN_JOB_TYPE, ScanJobPayload};
use crate::types::{
    AgentResultSummary, ResultSummary, ScanList, ScanRequest, ScanResults, ScanStatusReport,
    ScanSummary, ServiceStats,
};
use crate::worker::Worker;

/// Runtime knobs of the service, resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub health_check_interval: Duration,
    pub cleanup_interval: Duration,
    pub shutdown_timeout: Duration,
    pub default_scan_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&AgentscanConfig::default())
    }
}

impl From<&AgentscanConfig> for ServiceSettings {
    fn from(config: &AgentscanConfig) -> Self {
        Self {
            worker_count: config.service.worker_count,
            poll_interval: config.service.poll_interval(),
            health_check_interval: config.service.health_check_interval(),
            cleanup_interval: config.service.cleanup_interval(),
            shutdown_timeout: config.service.shutdown_timeout(),
            default_scan_timeout: config.service.default_scan_timeout(),
            max_attempts: config.queue.max_attempts,
            retry_delay: Duration::from_secs(config.queue.retry_delay_secs),
        }
    }
}

struct Lifecycle {
    running: bool,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    workers: Vec<Arc<Worker>>,
    started_at: Option<Instant>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            running: false,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            workers: Vec::new(),
            started_at: None,
        }
    }
}

/// Facade over the queue, the repository, and the agent manager.
pub struct OrchestrationService {
    repository: Arc<dyn ScanRepository>,
    queue: Arc<dyn JobQueue>,
    agents: Arc<AgentManager>,
    settings: ServiceSettings,
    lifecycle: Mutex<Lifecycle>,
}

impl OrchestrationService {
    pub fn new(
        repository: Arc<dyn ScanRepository>,
        queue: Arc<dyn JobQueue>,
        agents: Arc<AgentManager>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            repository,
            queue,
            agents,
            settings,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn agents(&self) -> &Arc<AgentManager> {
        &self.agents
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn repository(&self) -> &Arc<dyn ScanRepository> {
        &self.repository
    }

    /// Persist a new scan job and enqueue the work for it.
    ///
    /// Returns the scan job id. If the enqueue fails the scan job record is
    /// removed again so no queued-but-unrunnable scan is left behind.
    pub async fn submit_scan(&self, request: ScanRequest) -> Result<Uuid, AgentscanError> {
        let scan_type = validate_request(&request)?;

        let now = Utc::now();
        let queue_job_id = JobId::new();
        let mut metadata = request.metadata.clone();
        if let Some(callback) = &request.callback_url {
            metadata.insert("callback_url".to_string(), callback.clone());
        }

        let scan = ScanJob {
            id: Uuid::new_v4(),
            queue_job_id: Some(queue_job_id),
            repository_id: request.repository_id,
            user_id: request.user_id,
            repo_url: request.repo_url.clone(),
            branch: request.branch.clone(),
            commit_sha: request.commit_sha.clone(),
            scan_type,
            priority: request.priority,
            status: ScanJobStatus::Queued,
            agents_requested: request.agents.clone(),
            agents_completed: Vec::new(),
            error_message: None,
            metadata,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let payload = ScanJobPayload {
            scan_job_id: scan.id,
            repo_url: request.repo_url,
            branch: request.branch,
            commit_sha: request.commit_sha,
            scan_type,
            base_sha: request.base_sha.filter(|sha| !sha.is_empty()),
            changed_files: request.changed_files,
            agents: request.agents,
            options: request.options,
        }
        .into_map()?;

        let mut tags = vec![SCAN_JOB_TYPE.to_string(), scan_type.to_string()];
        if let Some(user_id) = request.user_id {
            tags.push(format!("user:{user_id}"));
        }

        let job = QueueJob::new(
            SCAN_JOB_TYPE,
            Priority::from_scan_priority(request.priority),
            payload,
        )
        .with_id(queue_job_id)
        .with_timeout(request.timeout.unwrap_or(self.settings.default_scan_timeout))
        .with_max_attempts(self.settings.max_attempts)
        .with_retry_delay(self.settings.retry_delay)
        .with_tags(tags);

        self.repository.create_scan_job(&scan).await?;

        if let Err(e) = self.queue.enqueue(job).await {
            warn!(scan_job_id = %scan.id, error = %e, "enqueue failed, removing scan job");
            if let Err(cleanup) = self.repository.delete_scan_job(scan.id).await {
                warn!(scan_job_id = %scan.id, error = %cleanup, "failed to remove orphaned scan job");
            }
            return Err(e);
        }

        info!(
            scan_job_id = %scan.id,
            queue_job_id = %queue_job_id,
            scan_type = %scan_type,
            priority = scan.priority,
            agents = scan.agents_requested.len(),
            "scan submitted"
        );
        Ok(scan.id)
    }

    pub async fn get_scan_status(&self, job_id: &str) -> Result<ScanStatusReport, AgentscanError> {
        let id = parse_job_id(job_id)?;
        let scan = self.repository.get_scan_job(id).await?;
        let results = self.repository.get_scan_results(id).await?;

        Ok(ScanStatusReport {
            job_id: scan.id,
            status: scan.status,
            progress: scan.progress(),
            started_at: scan.started_at,
            completed_at: scan.completed_at,
            duration: scan.duration(Utc::now()),
            agents_requested: scan.agents_requested.clone(),
            agents_completed: scan.agents_completed.clone(),
            error_message: scan.error_message.clone(),
            results: results.iter().map(AgentResultSummary::from).collect(),
        })
    }

    pub async fn get_scan_results(
        &self,
        job_id: &str,
        filter: &FindingFilter,
    ) -> Result<ScanResults, AgentscanError> {
        let id = parse_job_id(job_id)?;
        let scan = self.repository.get_scan_job(id).await?;
        let findings = self.repository.get_findings(id, filter).await?;
        let results = self.repository.get_scan_results(id).await?;

        Ok(ScanResults {
            job_id: scan.id,
            status: scan.status,
            repository: scan.repo_url.clone(),
            branch: scan.branch.clone(),
            commit_sha: scan.commit_sha.clone(),
            scan_type: scan.scan_type,
            started_at: scan.started_at,
            completed_at: scan.completed_at,
            duration: scan.duration(Utc::now()),
            summary: ResultSummary::from_findings(&findings),
            findings,
            agent_results: results.iter().map(AgentResultSummary::from).collect(),
            metadata: scan.metadata,
        })
    }

    /// Cancel a scan that has not finished.
    ///
    /// The queue job is cancelled best-effort; a worker that already holds it
    /// finds the scan terminal on its final write and stands down.
    pub async fn cancel_scan(&self, job_id: &str) -> Result<(), AgentscanError> {
        let id = parse_job_id(job_id)?;
        let mut scan = self.repository.get_scan_job(id).await?;
        scan.finish(ScanJobStatus::Cancelled, None, Utc::now())?;
        self.repository.update_scan_job(&scan).await?;
        info!(scan_job_id = %id, "scan cancelled");

        if let Some(queue_job_id) = scan.queue_job_id
            && let Err(e) = self.queue.cancel(&queue_job_id).await
        {
            warn!(scan_job_id = %id, queue_job_id = %queue_job_id, error = %e, "queue job cancel failed");
        }
        Ok(())
    }

    pub async fn list_scans(
        &self,
        filter: &ScanFilter,
        pagination: &Pagination,
    ) -> Result<ScanList, AgentscanError> {
        pagination.validate()?;
        let (jobs, total) = self.repository.list_scan_jobs(filter, pagination).await?;
        let now = Utc::now();
        Ok(ScanList {
            scans: jobs.iter().map(|job| ScanSummary::from_job(job, now)).collect(),
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages(total),
        })
    }

    /// Spawn the workers and the health and cleanup loops.
    pub async fn start(&self) -> Result<(), AgentscanError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.running {
            return Err(AgentscanError::Conflict("service is already running".into()));
        }

        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();
        let mut workers = Vec::with_capacity(self.settings.worker_count);
        for n in 1..=self.settings.worker_count {
            let worker = Arc::new(Worker::new(
                format!("worker-{n}"),
                Arc::clone(&self.queue),
                Arc::clone(&self.agents),
                Arc::clone(&self.repository),
                self.settings.poll_interval,
            ));
            tasks.spawn(Arc::clone(&worker).run(shutdown.clone()));
            workers.push(worker);
        }

        tasks.spawn(health_loop(
            Arc::clone(&self.agents),
            self.settings.health_check_interval,
            shutdown.clone(),
        ));
        tasks.spawn(cleanup_loop(
            Arc::clone(&self.queue),
            self.settings.cleanup_interval,
            shutdown.clone(),
        ));
        tasks.close();

        *lifecycle = Lifecycle {
            running: true,
            shutdown,
            tasks,
            workers,
            started_at: Some(Instant::now()),
        };
        info!(workers = self.settings.worker_count, "orchestration service started");
        Ok(())
    }

    /// Signal every loop to exit and wait up to the shutdown timeout.
    ///
    /// The service counts as stopped as soon as the signal is sent, even when
    /// the wait later times out; status queries do not wait for the drain.
    pub async fn stop(&self) -> Result<(), AgentscanError> {
        let tasks = {
            let mut lifecycle = self.lifecycle.lock().await;
            if !lifecycle.running {
                return Ok(());
            }
            lifecycle.running = false;
            lifecycle.shutdown.cancel();
            lifecycle.tasks.clone()
        };

        let timeout = self.settings.shutdown_timeout;
        match tokio::time::timeout(timeout, tasks.wait()).await {
            Ok(()) => {
                info!("orchestration service stopped");
                Ok(())
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "service tasks did not stop in time");
                Err(AgentscanError::Timeout { duration: timeout })
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.running
    }

    /// Aggregate health of the service and its collaborators.
    pub async fn health(&self) -> Result<(), AgentscanError> {
        if !self.is_running().await {
            return Err(AgentscanError::Unavailable("service is not running".into()));
        }
        self.repository.health().await?;
        self.queue.stats().await?;
        self.agents.health().await
    }

    pub async fn stats(&self) -> Result<ServiceStats, AgentscanError> {
        let (running, uptime, workers) = {
            let lifecycle = self.lifecycle.lock().await;
            (
                lifecycle.running,
                lifecycle
                    .started_at
                    .map(|at| at.elapsed())
                    .unwrap_or_default(),
                lifecycle
                    .workers
                    .iter()
                    .map(|worker| worker.stats())
                    .collect::<Vec<_>>(),
            )
        };
        Ok(ServiceStats {
            running,
            uptime,
            worker_count: self.settings.worker_count,
            workers,
            queue: self.queue.stats().await?,
            agents: self.agents.stats().await,
        })
    }
}

async fn health_loop(agents: Arc<AgentManager>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = agents.health_check_all().await {
                    debug!(error = %e, "agent health sweep found unhealthy agents");
                }
            }
        }
    }
    debug!("health loop stopped");
}

async fn cleanup_loop(queue: Arc<dyn JobQueue>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = queue.cleanup().await {
                    warn!(error = %e, "queue cleanup failed");
                }
                match queue.stats().await {
                    Ok(stats) => {
                        for status in [JobStatus::Queued, JobStatus::Scheduled, JobStatus::Running,
                            JobStatus::Retrying, JobStatus::DeadLettered] {
                            agentscan_prometheus::set_queue_depth(&status.to_string(), stats.count(status));
                        }
                    }
                    Err(e) => warn!(error = %e, "queue stats unavailable"),
                }
            }
        }
    }
    debug!("cleanup loop stopped");
}

fn parse_job_id(job_id: &str) -> Result<Uuid, AgentscanError> {
    Uuid::parse_str(job_id.trim())
        .map_err(|_| AgentscanError::Validation(format!("invalid job id: {job_id:?}")))
}

fn validate_request(request: &ScanRequest) -> Result<ScanType, AgentscanError> {
    let require = |value: &str, field: &str| {
        if value.trim().is_empty() {
            Err(AgentscanError::Validation(format!("{field} is required")))
        } else {
            Ok(())
        }
    };

    if request.repository_id.is_nil() {
        return Err(AgentscanError::Validation("repository_id is required".into()));
    }
    require(&request.repo_url, "repo_url")?;
    require(&request.branch, "branch")?;
    require(&request.commit_sha, "commit_sha")?;
    require(&request.scan_type, "scan_type")?;
    let scan_type = request.scan_type.trim().parse::<ScanType>().map_err(|_| {
        AgentscanError::Validation(format!(
            "scan_type must be one of full, incremental, ide (got {:?})",
            request.scan_type
        ))
    })?;
    if !(1..=10).contains(&request.priority) {
        return Err(AgentscanError::Validation(format!(
            "priority must be between 1 and 10 (got {})",
            request.priority
        )));
    }
    if request.agents.is_empty() {
        return Err(AgentscanError::Validation(
            "at least one agent is required".into(),
        ));
    }
    if request.agents.iter().any(|agent| agent.trim().is_empty()) {
        return Err(AgentscanError::Validation(
            "agent names must not be empty".into(),
        ));
    }
    Ok(scan_type)
}
