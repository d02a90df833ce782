// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue policy shared by every backing store: job validation, exponential
//! retry backoff, and the fail/dead-letter decision.

use std::time::Duration;

use agentscan_config::model::QueueConfig;
use agentscan_core::AgentscanError;
use agentscan_core::types::{FailureDisposition, JobStatus, QueueJob};
use chrono::{DateTime, Utc};

/// Runtime settings of a queue store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Upper bound on any single retry delay.
    pub max_retry_delay: Duration,
    /// Extra time past a job's timeout before its claim counts as abandoned.
    pub lease_grace: Duration,
    /// How long completed and cancelled jobs are kept before purging.
    pub retention: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_retry_delay: Duration::from_secs(config.max_retry_delay_secs),
            lease_grace: Duration::from_secs(config.lease_grace_secs),
            retention: Duration::from_secs(config.retention_secs),
        }
    }
}

/// Reject jobs missing a type or payload, or with no attempts allowed.
pub fn validate_job(job: &QueueJob) -> Result<(), AgentscanError> {
    if job.job_type.trim().is_empty() {
        return Err(AgentscanError::Validation("job type is required".into()));
    }
    if job.payload.is_empty() {
        return Err(AgentscanError::Validation("job payload is required".into()));
    }
    if job.max_attempts == 0 {
        return Err(AgentscanError::Validation(
            "max attempts must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Delay before the retry that follows a failure of attempt `attempt`.
///
/// `base * 2^(attempt-1)`, saturating, capped at `cap`.
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(cap)
}

/// Apply a failure to `job` in place and report what happened.
///
/// Retries move the job to `retrying` with the next attempt number and an
/// eligibility time in the future; exhausted jobs are dead-lettered.
pub fn apply_failure(
    job: &mut QueueJob,
    message: &str,
    settings: &QueueSettings,
    now: DateTime<Utc>,
) -> FailureDisposition {
    job.error_message = Some(message.to_string());
    job.worker_id = None;
    job.started_at = None;
    job.updated_at = now;

    if job.can_retry() {
        let delay = backoff_delay(job.retry_delay, job.attempt, settings.max_retry_delay);
        let retry_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        job.attempt += 1;
        job.status = JobStatus::Retrying;
        job.scheduled_at = Some(retry_at);
        FailureDisposition::Retrying {
            attempt: job.attempt,
            retry_at,
        }
    } else {
        job.status = JobStatus::DeadLettered;
        FailureDisposition::DeadLettered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentscan_core::types::Priority;

    fn job() -> QueueJob {
        let mut payload = serde_json::Map::new();
        payload.insert("scan_job_id".into(), "x".into());
        QueueJob::new("scan", Priority::Medium, payload)
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(30);
        let cap = Duration::from_secs(3600);
        assert_eq!(backoff_delay(base, 1, cap), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, 2, cap), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 3, cap), Duration::from_secs(120));
    }

    #[test]
    fn backoff_is_capped_and_never_overflows() {
        let base = Duration::from_secs(30);
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_delay(base, 10, cap), cap);
        assert_eq!(backoff_delay(base, u32::MAX, cap), cap);
    }

    #[test]
    fn validation_rejects_empty_type_and_payload() {
        let mut no_type = job();
        no_type.job_type = " ".into();
        assert!(validate_job(&no_type).is_err());

        let no_payload = QueueJob::new("scan", Priority::Low, serde_json::Map::new());
        assert!(validate_job(&no_payload).is_err());

        let zero_attempts = job().with_max_attempts(0);
        assert!(validate_job(&zero_attempts).is_err());

        assert!(validate_job(&job()).is_ok());
    }

    #[test]
    fn failure_retries_until_max_attempts_then_dead_letters() {
        let settings = QueueSettings::default();
        let mut job = job().with_max_attempts(3);
        let now = Utc::now();

        let first = apply_failure(&mut job, "boom", &settings, now);
        assert!(matches!(first, FailureDisposition::Retrying { attempt: 2, .. }));
        assert_eq!(job.status, JobStatus::Retrying);

        let second = apply_failure(&mut job, "boom", &settings, now);
        assert!(matches!(second, FailureDisposition::Retrying { attempt: 3, .. }));

        let third = apply_failure(&mut job, "boom", &settings, now);
        assert_eq!(third, FailureDisposition::DeadLettered);
        assert_eq!(job.status, JobStatus::DeadLettered);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn retry_eligibility_uses_backoff_of_failed_attempt() {
        let settings = QueueSettings::default();
        let mut job = job().with_retry_delay(Duration::from_secs(10));
        let now = Utc::now();

        apply_failure(&mut job, "boom", &settings, now);
        assert_eq!(job.scheduled_at, Some(now + chrono::Duration::seconds(10)));

        apply_failure(&mut job, "boom", &settings, now);
        assert_eq!(job.scheduled_at, Some(now + chrono::Duration::seconds(20)));
    }
}
