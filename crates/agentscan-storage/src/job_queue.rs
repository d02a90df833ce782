// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable [`JobQueue`] backed by the `queue_jobs` table.

use agentscan_core::AgentscanError;
use agentscan_core::traits::JobQueue;
use agentscan_core::types::{
    CleanupReport, FailureDisposition, JobFilter, JobId, JobResult, JobStats, JobStatus, QueueJob,
};
use agentscan_queue::{QueueSettings, apply_failure, validate_job};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::queries;

/// SQLite-backed priority queue.
///
/// Claims run inside a single-writer transaction, so a job is handed to at
/// most one worker even across service instances sharing the file.
pub struct SqliteJobQueue {
    db: Database,
    settings: QueueSettings,
}

impl SqliteJobQueue {
    pub fn new(db: Database, settings: QueueSettings) -> Self {
        Self { db, settings }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, mut job: QueueJob) -> Result<JobId, AgentscanError> {
        validate_job(&job)?;

        let now = Utc::now();
        job.status = match job.scheduled_at {
            Some(at) if at > now => JobStatus::Scheduled,
            _ => JobStatus::Queued,
        };
        job.worker_id = None;
        job.started_at = None;
        job.updated_at = now;

        let id = job.id;
        let priority = job.priority;
        let ready_at = job.ready_at(now);
        debug!(job_id = %id, %priority, status = %job.status, "job enqueued");
        queries::queue::insert(&self.db, job, ready_at)
            .await
            .map_err(into_queue_error)?;

        agentscan_prometheus::record_job_enqueued(&priority.to_string());
        Ok(id)
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<QueueJob>, AgentscanError> {
        let claimed = queries::queue::claim_next(&self.db, worker_id, Utc::now())
            .await
            .map_err(into_queue_error)?;
        if let Some(job) = &claimed {
            debug!(job_id = %job.id, worker_id, attempt = job.attempt, "job claimed");
        }
        Ok(claimed)
    }

    async fn complete(&self, job_id: &JobId, result: JobResult) -> Result<(), AgentscanError> {
        let id = *job_id;
        queries::queue::modify(&self.db, id, move |job| match job.status {
            JobStatus::Running => {
                job.status = JobStatus::Completed;
                job.result = Some(result);
                job.updated_at = Utc::now();
                Ok(())
            }
            JobStatus::Cancelled => Ok(()),
            other => Err(AgentscanError::Conflict(format!(
                "queue job {id} is {other}, not running"
            ))),
        })
        .await
    }

    async fn fail(
        &self,
        job_id: &JobId,
        message: &str,
    ) -> Result<FailureDisposition, AgentscanError> {
        let id = *job_id;
        let message = message.to_string();
        let settings = self.settings.clone();
        let log_message = message.clone();

        let disposition = queries::queue::modify(&self.db, id, move |job| match job.status {
            JobStatus::Running => Ok(apply_failure(job, &message, &settings, Utc::now())),
            JobStatus::Cancelled => Ok(FailureDisposition::Ignored),
            other => Err(AgentscanError::Conflict(format!(
                "queue job {id} is {other}, not running"
            ))),
        })
        .await?;

        if disposition == FailureDisposition::DeadLettered {
            warn!(job_id = %id, error = %log_message, "job dead-lettered");
        }
        Ok(disposition)
    }

    async fn cancel(&self, job_id: &JobId) -> Result<(), AgentscanError> {
        let id = *job_id;
        queries::queue::modify(&self.db, id, move |job| {
            if job.status.is_terminal() {
                return Err(AgentscanError::Conflict(format!(
                    "queue job {id} is already {}",
                    job.status
                )));
            }
            job.status = JobStatus::Cancelled;
            job.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn get_job(&self, job_id: &JobId) -> Result<QueueJob, AgentscanError> {
        queries::queue::get(&self.db, *job_id)
            .await?
            .ok_or_else(|| AgentscanError::not_found("queue job", job_id))
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<QueueJob>, AgentscanError> {
        let mut jobs: Vec<QueueJob> = queries::queue::list(&self.db, filter.status)
            .await?
            .into_iter()
            .filter(|job| filter.matches(job))
            .collect();
        if let Some(limit) = filter.limit {
            jobs.truncate(limit);
        }
        Ok(jobs)
    }

    async fn stats(&self) -> Result<JobStats, AgentscanError> {
        queries::queue::stats(&self.db)
            .await
            .map_err(into_queue_error)
    }

    async fn cleanup(&self) -> Result<CleanupReport, AgentscanError> {
        let (report, expired) =
            queries::queue::cleanup(&self.db, self.settings.clone(), Utc::now()).await?;
        for (job_id, disposition) in &expired {
            warn!(job_id = %job_id, ?disposition, "abandoned job claim expired");
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

/// Store failures on the hot path surface as retryable queue errors.
fn into_queue_error(e: AgentscanError) -> AgentscanError {
    match e {
        AgentscanError::Storage { source } => AgentscanError::Queue {
            message: "queue store unavailable".into(),
            source: Some(source),
        },
        other => other,
    }
}
