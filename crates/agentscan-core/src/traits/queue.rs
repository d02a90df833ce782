// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority job queue contract.

use async_trait::async_trait;

use crate::error::AgentscanError;
use crate::types::job::{
    CleanupReport, FailureDisposition, JobFilter, JobId, JobResult, JobStats, QueueJob,
};

/// A priority-ordered work queue with atomic claims, retries, and a dead-letter set.
///
/// Implementations must guarantee that a job is handed to at most one worker
/// at a time and that no job is dropped: every job ends up completed,
/// cancelled, or dead-lettered.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Validate and store a job. Future-dated jobs stay invisible until due.
    async fn enqueue(&self, job: QueueJob) -> Result<JobId, AgentscanError>;

    /// Claim the highest-priority eligible job for `worker_id`.
    ///
    /// Returns `Ok(None)` when nothing is eligible.
    async fn dequeue(&self, worker_id: &str) -> Result<Option<QueueJob>, AgentscanError>;

    /// Mark a running job completed. A no-op for cancelled jobs.
    async fn complete(&self, job_id: &JobId, result: JobResult) -> Result<(), AgentscanError>;

    /// Report a failed attempt; the queue retries with backoff or dead-letters.
    async fn fail(&self, job_id: &JobId, message: &str)
    -> Result<FailureDisposition, AgentscanError>;

    /// Cancel a job that has not reached a terminal state.
    async fn cancel(&self, job_id: &JobId) -> Result<(), AgentscanError>;

    async fn get_job(&self, job_id: &JobId) -> Result<QueueJob, AgentscanError>;

    /// Jobs matching `filter`, oldest first.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<QueueJob>, AgentscanError>;

    /// Counts by status and priority tier.
    async fn stats(&self) -> Result<JobStats, AgentscanError>;

    /// Expire abandoned claims, promote due jobs, and purge old finished jobs.
    async fn cleanup(&self) -> Result<CleanupReport, AgentscanError>;
}
