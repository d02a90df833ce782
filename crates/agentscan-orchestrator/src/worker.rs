// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue worker: claims scan jobs and turns them into agent fan-outs.
//!
//! Each worker handles one job at a time. Nothing a single job does can end
//! the poll loop; only the shutdown token does.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use agentscan_agents::{AgentManager, FanOut};
use agentscan_core::AgentscanError;
use agentscan_core::traits::{JobQueue, ScanRepository};
use agentscan_core::types::{
    AgentFinding, FailureDisposition, FindingRecord, FindingStatus, JobResult, QueueJob,
    ScanJob, ScanJobStatus, ScanOutput, ScanResultRecord, ScanResultStatus,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::payload::ScanJobPayload;
use crate::types::{WorkerState, WorkerStats};

const NO_JOB_YET: i64 = i64::MIN;

/// How a claimed job ended from the worker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    /// The scan job was already terminal; the queue job was closed as a no-op.
    Skipped,
    /// Shutdown arrived mid-scan; the claim is left for lease expiry.
    Interrupted,
}

impl JobOutcome {
    fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Interrupted => "interrupted",
        }
    }
}

pub struct Worker {
    id: String,
    queue: Arc<dyn JobQueue>,
    agents: Arc<AgentManager>,
    repository: Arc<dyn ScanRepository>,
    poll_interval: Duration,
    started_at: Instant,
    state: AtomicU8,
    jobs_processed: AtomicU64,
    jobs_failed: AtomicU64,
    /// Microseconds since the epoch, or [`NO_JOB_YET`].
    last_job_at: AtomicI64,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn JobQueue>,
        agents: Arc<AgentManager>,
        repository: Arc<dyn ScanRepository>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            agents,
            repository,
            poll_interval,
            started_at: Instant::now(),
            state: AtomicU8::new(WorkerState::Idle as u8),
            jobs_processed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            last_job_at: AtomicI64::new(NO_JOB_YET),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stats(&self) -> WorkerStats {
        let last_job_at = match self.last_job_at.load(Ordering::Relaxed) {
            NO_JOB_YET => None,
            micros => DateTime::from_timestamp_micros(micros),
        };
        WorkerStats {
            worker_id: self.id.clone(),
            state: self.state(),
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            last_job_at,
            uptime: self.started_at.elapsed(),
        }
    }

    fn state(&self) -> WorkerState {
        match self.state.load(Ordering::Relaxed) {
            s if s == WorkerState::Busy as u8 => WorkerState::Busy,
            s if s == WorkerState::Stopped as u8 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Poll the queue until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(worker_id = %self.id, "worker started");
        while !shutdown.is_cancelled() {
            match self.queue.dequeue(&self.id).await {
                Ok(Some(job)) => {
                    self.process_job(job, &shutdown).await;
                    continue;
                }
                Ok(None) => debug!(worker_id = %self.id, "no eligible job"),
                Err(e) => warn!(worker_id = %self.id, error = %e, "dequeue failed"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        self.set_state(WorkerState::Stopped);
        info!(worker_id = %self.id, "worker stopped");
    }

    /// Run one claimed job to its outcome and update the counters.
    pub async fn process_job(&self, job: QueueJob, shutdown: &CancellationToken) -> JobOutcome {
        self.set_state(WorkerState::Busy);
        self.last_job_at
            .store(Utc::now().timestamp_micros(), Ordering::Relaxed);
        let started = Instant::now();

        let outcome = self.handle(&job, shutdown).await;

        match outcome {
            JobOutcome::Completed | JobOutcome::Skipped => {
                self.jobs_processed.fetch_add(1, Ordering::Relaxed);
            }
            JobOutcome::Failed => {
                self.jobs_failed.fetch_add(1, Ordering::Relaxed);
            }
            JobOutcome::Interrupted => {}
        }
        agentscan_prometheus::record_job_processed(
            &self.id,
            outcome.as_str(),
            started.elapsed().as_secs_f64(),
        );
        info!(
            worker_id = %self.id,
            job_id = %job.id,
            attempt = job.attempt,
            outcome = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job processed"
        );
        self.set_state(WorkerState::Idle);
        outcome
    }

    async fn handle(&self, job: &QueueJob, shutdown: &CancellationToken) -> JobOutcome {
        let payload = match ScanJobPayload::from_map(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.fail_queue_job(job, &format!("failed to parse job payload: {e}"))
                    .await;
                return JobOutcome::Failed;
            }
        };

        let mut scan = match self.repository.get_scan_job(payload.scan_job_id).await {
            Ok(scan) => scan,
            Err(e) => {
                self.fail_queue_job(job, &format!("failed to load scan job: {e}"))
                    .await;
                return JobOutcome::Failed;
            }
        };

        if scan.status.is_terminal() {
            info!(scan_job_id = %scan.id, status = %scan.status, "scan already finished, closing queue job");
            return self.skip(job, &scan).await;
        }

        if let Err(e) = scan.mark_running(Utc::now()) {
            warn!(scan_job_id = %scan.id, error = %e, "scan job cannot start");
            return self.skip(job, &scan).await;
        }
        match self.repository.update_scan_job(&scan).await {
            Ok(()) => {}
            Err(AgentscanError::Conflict(_)) => {
                info!(scan_job_id = %scan.id, "scan job finished before it started, closing queue job");
                return self.skip(job, &scan).await;
            }
            Err(e) => {
                self.fail_queue_job(job, &format!("failed to mark scan job running: {e}"))
                    .await;
                return JobOutcome::Failed;
            }
        }

        let config = payload.scan_config(job.timeout);
        let fan_out = self.fan_out(&scan.agents_requested, &config, job.timeout, shutdown).await;

        if shutdown.is_cancelled() && fan_out.was_cancelled() {
            warn!(
                scan_job_id = %scan.id,
                job_id = %job.id,
                unfinished = ?fan_out.unfinished,
                "shutdown interrupted scan, leaving claim for lease expiry"
            );
            return JobOutcome::Interrupted;
        }

        let findings = self.persist_outcomes(&scan, &fan_out, job.timeout).await;

        if fan_out.succeeded.is_empty() {
            let message = match &fan_out.last_error {
                Some(e) => format!("all agents failed: {e}"),
                None => "no agent produced a result".to_string(),
            };
            self.fail_scan(job, scan, &message).await;
            return JobOutcome::Failed;
        }

        scan.agents_completed = scan
            .agents_requested
            .iter()
            .filter(|name| fan_out.succeeded.contains_key(name.as_str()))
            .cloned()
            .collect();
        if let Err(e) = scan.finish(ScanJobStatus::Completed, None, Utc::now()) {
            warn!(scan_job_id = %scan.id, error = %e, "scan job cannot complete");
            return self.skip(job, &scan).await;
        }

        match self.repository.update_scan_job(&scan).await {
            Ok(()) => {}
            Err(AgentscanError::Conflict(_)) => {
                info!(scan_job_id = %scan.id, "scan job was cancelled while running");
                return self.skip(job, &scan).await;
            }
            Err(e) => {
                error!(scan_job_id = %scan.id, error = %e, "failed to store completed scan job");
                self.fail_queue_job(job, &format!("failed to update scan job: {e}"))
                    .await;
                return JobOutcome::Failed;
            }
        }

        let output = json!({
            "scan_job_id": scan.id.to_string(),
            "agents_completed": scan.agents_completed,
            "findings": findings,
        });
        let duration = scan.duration(Utc::now());
        if let Err(e) = self
            .queue
            .complete(&job.id, JobResult::success(output, duration))
            .await
        {
            error!(job_id = %job.id, error = %e, "failed to complete queue job");
        }
        JobOutcome::Completed
    }

    /// Fan out under a deadline of `timeout`, also stopping on shutdown.
    async fn fan_out(
        &self,
        agents: &[String],
        config: &agentscan_core::types::ScanConfig,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> FanOut {
        let deadline = shutdown.child_token();
        let timer = {
            let deadline = deadline.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            })
        };
        let fan_out = self
            .agents
            .execute_parallel_scans(agents, config, &deadline)
            .await;
        timer.abort();
        fan_out
    }

    /// Store one scan result per agent outcome, plus findings for successes.
    ///
    /// Returns the number of findings stored.
    async fn persist_outcomes(&self, scan: &ScanJob, fan_out: &FanOut, timeout: Duration) -> usize {
        let mut stored = 0;

        let mut succeeded: Vec<(&String, &ScanOutput)> = fan_out.succeeded.iter().collect();
        succeeded.sort_by(|a, b| a.0.cmp(b.0));
        for (agent, output) in succeeded {
            stored += self.store_success(scan, agent, output).await;
        }

        let mut failed: Vec<(&String, &String)> = fan_out.failed.iter().collect();
        failed.sort_by(|a, b| a.0.cmp(b.0));
        for (agent, message) in failed {
            self.store_failure(scan, agent, message.clone()).await;
        }

        let timed_out = AgentscanError::Timeout { duration: timeout }.to_string();
        for agent in &fan_out.unfinished {
            self.store_failure(scan, agent, timed_out.clone()).await;
        }
        stored
    }

    async fn store_success(&self, scan: &ScanJob, agent: &str, output: &ScanOutput) -> usize {
        let record = ScanResultRecord {
            id: Uuid::new_v4(),
            scan_job_id: scan.id,
            agent_name: agent.to_string(),
            status: ScanResultStatus::Completed,
            findings_count: output.findings.len(),
            duration: output.duration,
            error_message: None,
            raw_output: serde_json::to_value(output).ok(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.repository.create_scan_result(&record).await {
            // Findings reference the result row, so they cannot be stored either.
            error!(scan_job_id = %scan.id, agent, error = %e, "failed to store scan result");
            return 0;
        }

        let mut stored = 0;
        for finding in &output.findings {
            let record = finding_record(scan.id, record.id, finding);
            match self.repository.create_finding(&record).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    error!(scan_job_id = %scan.id, agent, rule_id = %finding.rule_id, error = %e, "failed to store finding");
                }
            }
        }
        stored
    }

    async fn store_failure(&self, scan: &ScanJob, agent: &str, message: String) {
        let record = ScanResultRecord {
            id: Uuid::new_v4(),
            scan_job_id: scan.id,
            agent_name: agent.to_string(),
            status: ScanResultStatus::Failed,
            findings_count: 0,
            duration: Duration::ZERO,
            error_message: Some(message),
            raw_output: None,
            created_at: Utc::now(),
        };
        if let Err(e) = self.repository.create_scan_result(&record).await {
            error!(scan_job_id = %scan.id, agent, error = %e, "failed to store scan result");
        }
    }

    /// Report a total failure to the queue; the scan job only fails once the
    /// queue gives up on the job.
    async fn fail_scan(&self, job: &QueueJob, mut scan: ScanJob, message: &str) {
        match self.fail_queue_job(job, message).await {
            Some(FailureDisposition::DeadLettered) => {
                scan.agents_completed.clear();
                if let Err(e) = scan.finish(ScanJobStatus::Failed, Some(message.to_string()), Utc::now()) {
                    warn!(scan_job_id = %scan.id, error = %e, "scan job cannot fail");
                    return;
                }
                match self.repository.update_scan_job(&scan).await {
                    Ok(()) => {}
                    Err(AgentscanError::Conflict(_)) => {
                        info!(scan_job_id = %scan.id, "scan job was cancelled while running");
                    }
                    Err(e) => {
                        error!(scan_job_id = %scan.id, error = %e, "failed to store failed scan job");
                    }
                }
            }
            Some(FailureDisposition::Retrying { attempt, retry_at }) => {
                info!(scan_job_id = %scan.id, attempt, %retry_at, "scan will be retried");
            }
            Some(FailureDisposition::Ignored) | None => {}
        }
    }

    async fn fail_queue_job(&self, job: &QueueJob, message: &str) -> Option<FailureDisposition> {
        warn!(worker_id = %self.id, job_id = %job.id, error = message, "job failed");
        match self.queue.fail(&job.id, message).await {
            Ok(disposition) => Some(disposition),
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to report job failure");
                None
            }
        }
    }

    async fn skip(&self, job: &QueueJob, scan: &ScanJob) -> JobOutcome {
        let output = json!({ "scan_job_id": scan.id.to_string(), "skipped": true });
        if let Err(e) = self
            .queue
            .complete(&job.id, JobResult::success(output, Duration::ZERO))
            .await
        {
            error!(job_id = %job.id, error = %e, "failed to complete queue job");
        }
        JobOutcome::Skipped
    }
}

fn finding_record(scan_job_id: Uuid, scan_result_id: Uuid, finding: &AgentFinding) -> FindingRecord {
    let now = Utc::now();
    FindingRecord {
        id: Uuid::new_v4(),
        scan_result_id,
        scan_job_id,
        tool: finding.tool.clone(),
        rule_id: finding.rule_id.clone(),
        severity: finding.severity,
        category: finding.category,
        title: finding.title.clone(),
        description: finding.description.clone(),
        file_path: finding.file.clone(),
        line: finding.line,
        column: finding.column,
        code_snippet: finding.code.clone(),
        confidence: finding.confidence,
        status: FindingStatus::Open,
        fix_suggestion: finding.fix.clone(),
        references: finding.references.clone(),
        created_at: now,
        updated_at: now,
    }
}
