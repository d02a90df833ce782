// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A `JobQueue` wrapper whose operations can be made to fail on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agentscan_core::AgentscanError;
use agentscan_core::traits::JobQueue;
use agentscan_core::types::{
    CleanupReport, FailureDisposition, JobFilter, JobId, JobResult, JobStats, QueueJob,
};
use agentscan_queue::{MemoryJobQueue, QueueSettings};
use async_trait::async_trait;

/// Delegates to an inner queue unless a fault switch is on.
pub struct FaultyQueue {
    inner: Arc<dyn JobQueue>,
    fail_enqueue: AtomicBool,
    fail_dequeue: AtomicBool,
    fail_stats: AtomicBool,
}

impl FaultyQueue {
    pub fn new(inner: Arc<dyn JobQueue>) -> Self {
        Self {
            inner,
            fail_enqueue: AtomicBool::new(false),
            fail_dequeue: AtomicBool::new(false),
            fail_stats: AtomicBool::new(false),
        }
    }

    /// Wrap a fresh in-memory queue.
    pub fn memory(settings: QueueSettings) -> Self {
        Self::new(Arc::new(MemoryJobQueue::new(settings)))
    }

    pub fn inner(&self) -> &Arc<dyn JobQueue> {
        &self.inner
    }

    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_dequeue(&self, fail: bool) {
        self.fail_dequeue.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_stats(&self, fail: bool) {
        self.fail_stats.store(fail, Ordering::SeqCst);
    }

    fn fault(switch: &AtomicBool, operation: &str) -> Result<(), AgentscanError> {
        if switch.load(Ordering::SeqCst) {
            tracing::debug!(operation, "injected queue fault");
            Err(AgentscanError::queue("queue store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobQueue for FaultyQueue {
    async fn enqueue(&self, job: QueueJob) -> Result<JobId, AgentscanError> {
        Self::fault(&self.fail_enqueue, "enqueue")?;
        self.inner.enqueue(job).await
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<QueueJob>, AgentscanError> {
        Self::fault(&self.fail_dequeue, "dequeue")?;
        self.inner.dequeue(worker_id).await
    }

    async fn complete(&self, job_id: &JobId, result: JobResult) -> Result<(), AgentscanError> {
        self.inner.complete(job_id, result).await
    }

    async fn fail(
        &self,
        job_id: &JobId,
        message: &str,
    ) -> Result<FailureDisposition, AgentscanError> {
        self.inner.fail(job_id, message).await
    }

    async fn cancel(&self, job_id: &JobId) -> Result<(), AgentscanError> {
        self.inner.cancel(job_id).await
    }

    async fn get_job(&self, job_id: &JobId) -> Result<QueueJob, AgentscanError> {
        self.inner.get_job(job_id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<QueueJob>, AgentscanError> {
        self.inner.list_jobs(filter).await
    }

    async fn stats(&self) -> Result<JobStats, AgentscanError> {
        Self::fault(&self.fail_stats, "stats")?;
        self.inner.stats().await
    }

    async fn cleanup(&self) -> Result<CleanupReport, AgentscanError> {
        self.inner.cleanup().await
    }
}
