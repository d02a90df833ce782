// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scan domain records: scan jobs, per-agent scan results, and findings.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::AgentscanError;
use crate::types::agent::{FixSuggestion, Severity, VulnCategory};
use crate::types::job::JobId;

/// Kind of scan requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Full,
    Incremental,
    Ide,
}

/// Lifecycle state of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanJobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanJobStatus::Completed | ScanJobStatus::Failed | ScanJobStatus::Cancelled
        )
    }
}

/// One requested security scan across one or more agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    /// The queue job carrying this scan.
    pub queue_job_id: Option<JobId>,
    pub repository_id: Uuid,
    pub user_id: Option<Uuid>,
    pub repo_url: String,
    pub branch: String,
    pub commit_sha: String,
    pub scan_type: ScanType,
    pub priority: i32,
    pub status: ScanJobStatus,
    pub agents_requested: Vec<String>,
    pub agents_completed: Vec<String>,
    pub error_message: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanJob {
    /// Move to `running`. `started_at` is only set on the first call.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), AgentscanError> {
        self.ensure_not_terminal()?;
        self.status = ScanJobStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Enter a terminal state, stamping `completed_at`.
    pub fn finish(
        &mut self,
        status: ScanJobStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AgentscanError> {
        if !status.is_terminal() {
            return Err(AgentscanError::Internal(format!(
                "{status} is not a terminal scan status"
            )));
        }
        self.ensure_not_terminal()?;
        self.status = status;
        if error_message.is_some() {
            self.error_message = error_message;
        }
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_not_terminal(&self) -> Result<(), AgentscanError> {
        if self.status.is_terminal() {
            return Err(AgentscanError::Conflict(format!(
                "scan job {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Percentage of requested agents that produced a result.
    ///
    /// Never reports 100 unless the job completed.
    pub fn progress(&self) -> f64 {
        let requested = self.agents_requested.len();
        if requested == 0 {
            return 0.0;
        }
        let completed = self.agents_completed.len().min(requested);
        let progress = completed as f64 / requested as f64 * 100.0;
        if progress >= 100.0 && self.status != ScanJobStatus::Completed {
            return progress.min(99.0);
        }
        progress
    }

    /// Wall time between start and completion, or until `now` while running.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.completed_at.unwrap_or(now);
        (end - started).to_std().unwrap_or_default()
    }
}

/// Outcome of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanResultStatus {
    Completed,
    Failed,
}

/// Outcome of one agent against one scan job. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResultRecord {
    pub id: Uuid,
    pub scan_job_id: Uuid,
    pub agent_name: String,
    pub status: ScanResultStatus,
    pub findings_count: usize,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub raw_output: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Triage state of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Fixed,
    Ignored,
    FalsePositive,
}

/// One reported issue, owned by a scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub id: Uuid,
    pub scan_result_id: Uuid,
    pub scan_job_id: Uuid,
    pub tool: String,
    pub rule_id: String,
    pub severity: Severity,
    pub category: VulnCategory,
    pub title: String,
    pub description: String,
    pub file_path: String,
    pub line: u32,
    pub column: Option<u32>,
    pub code_snippet: Option<String>,
    pub confidence: f64,
    pub status: FindingStatus,
    pub fix_suggestion: Option<FixSuggestion>,
    pub references: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(requested: &[&str]) -> ScanJob {
        let now = Utc::now();
        ScanJob {
            id: Uuid::new_v4(),
            queue_job_id: None,
            repository_id: Uuid::new_v4(),
            user_id: None,
            repo_url: "https://example.com/repo.git".into(),
            branch: "main".into(),
            commit_sha: "abc123".into(),
            scan_type: ScanType::Full,
            priority: 5,
            status: ScanJobStatus::Queued,
            agents_requested: requested.iter().map(|s| s.to_string()).collect(),
            agents_completed: Vec::new(),
            error_message: None,
            metadata: BTreeMap::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn started_at_is_set_once() {
        let mut job = job(&["a"]);
        let first = Utc::now();
        job.mark_running(first).unwrap();
        job.mark_running(first + chrono::Duration::seconds(5)).unwrap();
        assert_eq!(job.started_at, Some(first));
    }

    #[test]
    fn finish_rejects_second_terminal_transition() {
        let mut job = job(&["a"]);
        let now = Utc::now();
        job.finish(ScanJobStatus::Cancelled, None, now).unwrap();

        let err = job
            .finish(ScanJobStatus::Completed, None, now + chrono::Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, AgentscanError::Conflict(_)));
        assert_eq!(job.status, ScanJobStatus::Cancelled);
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn finish_requires_terminal_status() {
        let mut job = job(&["a"]);
        assert!(job.finish(ScanJobStatus::Running, None, Utc::now()).is_err());
    }

    #[test]
    fn progress_is_zero_without_agents() {
        assert_eq!(job(&[]).progress(), 0.0);
    }

    #[test]
    fn progress_reaches_100_only_when_completed() {
        let mut job = job(&["a", "b"]);
        job.agents_completed = vec!["a".into()];
        assert_eq!(job.progress(), 50.0);

        job.agents_completed = vec!["a".into(), "b".into()];
        assert!(job.progress() < 100.0);

        job.finish(ScanJobStatus::Completed, None, Utc::now()).unwrap();
        assert_eq!(job.progress(), 100.0);
    }

    #[test]
    fn duration_spans_start_to_completion() {
        let mut job = job(&["a"]);
        let start = Utc::now();
        job.mark_running(start).unwrap();
        job.finish(
            ScanJobStatus::Completed,
            None,
            start + chrono::Duration::seconds(3),
        )
        .unwrap();
        assert_eq!(job.duration(Utc::now()), Duration::from_secs(3));
    }

    #[test]
    fn scan_type_parses_lowercase() {
        assert_eq!("incremental".parse::<ScanType>().unwrap(), ScanType::Incremental);
        assert!("weekly".parse::<ScanType>().is_err());
    }
}
