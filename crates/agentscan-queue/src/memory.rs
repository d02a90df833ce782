// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process priority queue.
//!
//! All state sits behind one `tokio::sync::Mutex`, which makes every claim
//! atomic. Eligible jobs are indexed by `(tier desc, ready_at, seq)`;
//! future-dated jobs wait in a second index until they are due. Index entries
//! are removed lazily: an entry whose job has moved on is skipped on pop.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use agentscan_core::AgentscanError;
use agentscan_core::traits::JobQueue;
use agentscan_core::types::{
    CleanupReport, FailureDisposition, JobFilter, JobId, JobResult, JobStats, JobStatus, Priority,
    QueueJob,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::policy::{QueueSettings, apply_failure, validate_job};

type ReadyKey = (Reverse<Priority>, DateTime<Utc>, u64, JobId);
type DelayedKey = (DateTime<Utc>, u64, JobId);

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, QueueJob>,
    ready: BTreeSet<ReadyKey>,
    delayed: BTreeSet<DelayedKey>,
    seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn push_ready(&mut self, id: JobId, priority: Priority, ready_at: DateTime<Utc>) {
        let seq = self.next_seq();
        self.ready.insert((Reverse(priority), ready_at, seq, id));
    }

    fn push_delayed(&mut self, id: JobId, at: DateTime<Utc>) {
        let seq = self.next_seq();
        self.delayed.insert((at, seq, id));
    }

    /// Move due scheduled and retrying jobs into the ready index.
    fn promote_due(&mut self, now: DateTime<Utc>) -> usize {
        let mut promoted = 0;
        while let Some(&(at, _, id)) = self.delayed.first() {
            if at > now {
                break;
            }
            self.delayed.pop_first();

            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            let waiting = matches!(job.status, JobStatus::Scheduled | JobStatus::Retrying);
            if !waiting || job.scheduled_at != Some(at) {
                continue;
            }
            job.status = JobStatus::Queued;
            job.updated_at = now;
            let priority = job.priority;
            self.push_ready(id, priority, at);
            promoted += 1;
        }
        promoted
    }

    /// Apply a failure and index the job again if it will be retried.
    fn fail_job(
        &mut self,
        id: &JobId,
        message: &str,
        settings: &QueueSettings,
        now: DateTime<Utc>,
    ) -> Result<FailureDisposition, AgentscanError> {
        let job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| AgentscanError::not_found("queue job", id))?;

        match job.status {
            JobStatus::Cancelled => return Ok(FailureDisposition::Ignored),
            JobStatus::Running => {}
            other => {
                return Err(AgentscanError::Conflict(format!(
                    "queue job {id} is {other}, not running"
                )));
            }
        }

        let disposition = apply_failure(job, message, settings, now);
        if let FailureDisposition::Retrying { retry_at, .. } = disposition {
            self.push_delayed(*id, retry_at);
        }
        Ok(disposition)
    }
}

/// Priority job queue held entirely in memory.
///
/// Jobs do not survive a restart; use the SQLite store for durability.
pub struct MemoryJobQueue {
    state: Mutex<State>,
    settings: QueueSettings,
}

impl MemoryJobQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            state: Mutex::new(State::default()),
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new(QueueSettings::default())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, mut job: QueueJob) -> Result<JobId, AgentscanError> {
        validate_job(&job)?;

        let now = Utc::now();
        job.updated_at = now;
        job.worker_id = None;
        job.started_at = None;

        let id = job.id;
        let priority = job.priority;
        let mut state = self.state.lock().await;
        match job.scheduled_at {
            Some(at) if at > now => {
                job.status = JobStatus::Scheduled;
                state.push_delayed(id, at);
            }
            _ => {
                job.status = JobStatus::Queued;
                state.push_ready(id, priority, now);
            }
        }
        debug!(job_id = %id, %priority, status = %job.status, "job enqueued");
        state.jobs.insert(id, job);
        drop(state);

        agentscan_prometheus::record_job_enqueued(&priority.to_string());
        Ok(id)
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<QueueJob>, AgentscanError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        state.promote_due(now);

        while let Some((_, _, _, id)) = state.ready.pop_first() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.status != JobStatus::Queued {
                continue;
            }
            job.status = JobStatus::Running;
            job.worker_id = Some(worker_id.to_string());
            job.started_at = Some(now);
            job.updated_at = now;
            debug!(job_id = %id, worker_id, attempt = job.attempt, "job claimed");
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn complete(&self, job_id: &JobId, result: JobResult) -> Result<(), AgentscanError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| AgentscanError::not_found("queue job", job_id))?;

        match job.status {
            JobStatus::Running => {
                job.status = JobStatus::Completed;
                job.result = Some(result);
                job.updated_at = Utc::now();
                Ok(())
            }
            JobStatus::Cancelled => {
                debug!(job_id = %job_id, "completion of cancelled job ignored");
                Ok(())
            }
            other => Err(AgentscanError::Conflict(format!(
                "queue job {job_id} is {other}, not running"
            ))),
        }
    }

    async fn fail(
        &self,
        job_id: &JobId,
        message: &str,
    ) -> Result<FailureDisposition, AgentscanError> {
        let mut state = self.state.lock().await;
        let disposition = state.fail_job(job_id, message, &self.settings, Utc::now())?;
        if disposition == FailureDisposition::DeadLettered {
            warn!(job_id = %job_id, error = message, "job dead-lettered");
        }
        Ok(disposition)
    }

    async fn cancel(&self, job_id: &JobId) -> Result<(), AgentscanError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| AgentscanError::not_found("queue job", job_id))?;

        if job.status.is_terminal() {
            return Err(AgentscanError::Conflict(format!(
                "queue job {job_id} is already {}",
                job.status
            )));
        }
        job.status = JobStatus::Cancelled;
        job.updated_at = Utc::now();
        debug!(job_id = %job_id, "job cancelled");
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<QueueJob, AgentscanError> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| AgentscanError::not_found("queue job", job_id))
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<QueueJob>, AgentscanError> {
        let state = self.state.lock().await;
        let mut jobs: Vec<QueueJob> = state
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        if let Some(limit) = filter.limit {
            jobs.truncate(limit);
        }
        Ok(jobs)
    }

    async fn stats(&self) -> Result<JobStats, AgentscanError> {
        let state = self.state.lock().await;
        let mut stats = JobStats::default();
        for job in state.jobs.values() {
            stats.record(job.status, job.priority, 1);
        }
        Ok(stats)
    }

    async fn cleanup(&self) -> Result<CleanupReport, AgentscanError> {
        let now = Utc::now();
        let mut report = CleanupReport::default();
        let mut state = self.state.lock().await;

        let expired: Vec<JobId> = state
            .jobs
            .values()
            .filter(|job| job.is_expired(now, self.settings.lease_grace))
            .map(|job| job.id)
            .collect();
        for id in expired {
            let disposition = state.fail_job(&id, "job timeout", &self.settings, now)?;
            warn!(job_id = %id, ?disposition, "abandoned job claim expired");
            report.expired += 1;
        }

        report.promoted = state.promote_due(now);

        let cutoff = chrono::Duration::from_std(self.settings.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention));
        if let Some(cutoff) = cutoff {
            let before = state.jobs.len();
            state.jobs.retain(|_, job| {
                !(matches!(job.status, JobStatus::Completed | JobStatus::Cancelled)
                    && job.updated_at < cutoff)
            });
            report.purged = before - state.jobs.len();
        }

        if report != CleanupReport::default() {
            info!(
                expired = report.expired,
                promoted = report.promoted,
                purged = report.purged,
                "queue cleanup finished"
            );
        }
        Ok(report)
    }
}
