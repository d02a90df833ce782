// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue job types: identity, priority tiers, status machine, and stats.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Default per-job execution timeout.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default number of execution attempts before a job is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential retry backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Unique identifier of a queue job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Coarse scheduling tier. Ordering is `Low < Medium < High`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric weight of the tier (higher runs first).
    pub fn weight(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 5,
            Priority::High => 10,
        }
    }

    /// Inverse of [`Priority::weight`].
    pub fn from_weight(weight: i64) -> Option<Self> {
        match weight {
            1 => Some(Priority::Low),
            5 => Some(Priority::Medium),
            10 => Some(Priority::High),
            _ => None,
        }
    }

    /// Map a caller-facing numeric priority onto a tier: `>=10` high, `>=5` medium, else low.
    pub fn from_scan_priority(priority: i32) -> Self {
        match priority {
            p if p >= 10 => Priority::High,
            p if p >= 5 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// Lifecycle state of a queue job.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Eligible for dequeue.
    Queued,
    /// Future-dated; invisible until `scheduled_at`.
    Scheduled,
    /// Claimed by a worker.
    Running,
    /// Waiting out a retry backoff.
    Retrying,
    Completed,
    Cancelled,
    /// Exhausted its attempts; kept for manual inspection.
    DeadLettered,
}

impl JobStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::DeadLettered
        )
    }

    /// States in which the job is waiting to be claimed.
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Scheduled | JobStatus::Retrying
        )
    }
}

/// Outcome reported by a worker when it completes a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn success(output: serde_json::Value, duration: Duration) -> Self {
        Self {
            success: true,
            output,
            duration,
            finished_at: Utc::now(),
        }
    }
}

/// A unit of transport-level work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: JobId,
    pub job_type: String,
    pub priority: Priority,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub status: JobStatus,
    /// Current attempt number, starting at 1.
    pub attempt: u32,
    pub max_attempts: u32,
    /// Base delay; the n-th retry waits `retry_delay * 2^(n-1)`.
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub worker_id: Option<String>,
    /// When the current claim started.
    pub started_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result: Option<JobResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueJob {
    /// Create a job with default timeout, attempts, and retry delay.
    pub fn new(
        job_type: impl Into<String>,
        priority: Priority,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type: job_type.into(),
            priority,
            payload,
            status: JobStatus::Queued,
            attempt: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_JOB_TIMEOUT,
            scheduled_at: None,
            tags: Vec::new(),
            worker_id: None,
            started_at: None,
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Time from which a job enqueued at `now` may be dequeued.
    ///
    /// A `scheduled_at` in the past counts as `now`, so it cannot overtake
    /// jobs enqueued before it.
    pub fn ready_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.scheduled_at {
            Some(at) if at > now => at,
            _ => now,
        }
    }

    /// Whether a running claim has outlived `timeout + grace`.
    pub fn is_expired(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        let Some(started) = self.started_at else {
            return false;
        };
        let limit = self.timeout.saturating_add(grace);
        match chrono::Duration::from_std(limit) {
            Ok(limit) => now - started > limit,
            Err(_) => false,
        }
    }

    /// Whether a failure on the current attempt leads to another attempt.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// What the queue did with a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Scheduled for another attempt.
    Retrying {
        attempt: u32,
        retry_at: DateTime<Utc>,
    },
    /// Out of attempts; moved to the dead-letter set.
    DeadLettered,
    /// The job had been cancelled; the failure report was absorbed.
    Ignored,
}

/// Filter for listing queue jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub priority: Option<Priority>,
    pub job_type: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn matches(&self, job: &QueueJob) -> bool {
        self.status.is_none_or(|s| job.status == s)
            && self.priority.is_none_or(|p| job.priority == p)
            && self
                .job_type
                .as_deref()
                .is_none_or(|t| job.job_type == t)
            && self
                .tag
                .as_deref()
                .is_none_or(|t| job.tags.iter().any(|tag| tag == t))
    }
}

/// Queue counts for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: u64,
    pub by_status: BTreeMap<JobStatus, u64>,
    pub by_priority: BTreeMap<Priority, u64>,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus, priority: Priority, count: u64) {
        self.total += count;
        *self.by_status.entry(status).or_default() += count;
        *self.by_priority.entry(priority).or_default() += count;
    }

    pub fn count(&self, status: JobStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or_default()
    }
}

/// Summary of one queue maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Running jobs whose claim expired and were failed.
    pub expired: usize,
    /// Scheduled or retrying jobs that became eligible.
    pub promoted: usize,
    /// Finished jobs removed after the retention window.
    pub purged: usize,
}
