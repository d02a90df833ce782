// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response types of the orchestration service.

use std::collections::BTreeMap;
use std::time::Duration;

use agentscan_agents::AgentManagerStats;
use agentscan_core::types::{
    FindingRecord, JobStats, ScanJob, ScanJobStatus, ScanResultRecord, ScanResultStatus, ScanType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// A request to scan one commit of a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub repository_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub repo_url: String,
    pub branch: String,
    pub commit_sha: String,
    /// Base commit of a pull request scan.
    #[serde(default)]
    pub base_sha: Option<String>,
    /// Files to restrict an incremental scan to.
    #[serde(default)]
    pub changed_files: Vec<String>,
    /// One of `full`, `incremental`, `ide`.
    pub scan_type: String,
    /// 1 to 10, higher runs sooner.
    pub priority: i32,
    pub agents: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Outcome of one agent as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResultSummary {
    pub agent_name: String,
    pub status: ScanResultStatus,
    pub findings_count: usize,
    pub duration: Duration,
    pub error_message: Option<String>,
}

impl From<&ScanResultRecord> for AgentResultSummary {
    fn from(record: &ScanResultRecord) -> Self {
        Self {
            agent_name: record.agent_name.clone(),
            status: record.status,
            findings_count: record.findings_count,
            duration: record.duration,
            error_message: record.error_message.clone(),
        }
    }
}

/// Point-in-time status of a scan job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStatusReport {
    pub job_id: Uuid,
    pub status: ScanJobStatus,
    /// 0 to 100.
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub agents_requested: Vec<String>,
    pub agents_completed: Vec<String>,
    pub error_message: Option<String>,
    pub results: Vec<AgentResultSummary>,
}

/// Finding counts by severity, tool, and category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub total_findings: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_tool: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

impl ResultSummary {
    pub fn from_findings(findings: &[FindingRecord]) -> Self {
        let mut summary = Self {
            total_findings: findings.len(),
            ..Self::default()
        };
        for finding in findings {
            *summary
                .by_severity
                .entry(finding.severity.to_string())
                .or_default() += 1;
            *summary.by_tool.entry(finding.tool.clone()).or_default() += 1;
            *summary
                .by_category
                .entry(finding.category.to_string())
                .or_default() += 1;
        }
        summary
    }
}

/// Findings of a scan plus per-agent outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResults {
    pub job_id: Uuid,
    pub status: ScanJobStatus,
    pub repository: String,
    pub branch: String,
    pub commit_sha: String,
    pub scan_type: ScanType,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub findings: Vec<FindingRecord>,
    pub summary: ResultSummary,
    pub agent_results: Vec<AgentResultSummary>,
    pub metadata: BTreeMap<String, String>,
}

/// One row of a scan listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub job_id: Uuid,
    pub repository: String,
    pub branch: String,
    pub commit_sha: String,
    pub scan_type: ScanType,
    pub status: ScanJobStatus,
    pub priority: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

impl ScanSummary {
    pub fn from_job(job: &ScanJob, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job.id,
            repository: job.repo_url.clone(),
            branch: job.branch.clone(),
            commit_sha: job.commit_sha.clone(),
            scan_type: job.scan_type,
            status: job.status,
            priority: job.priority,
            started_at: job.started_at,
            completed_at: job.completed_at,
            duration: job.duration(now),
            created_at: job.created_at,
        }
    }
}

/// One page of scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanList {
    pub scans: Vec<ScanSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

/// What a worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Busy,
    Stopped,
}

/// Counters of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    pub worker_id: String,
    pub state: WorkerState,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub last_job_at: Option<DateTime<Utc>>,
    pub uptime: Duration,
}

/// Service-wide snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStats {
    pub running: bool,
    pub uptime: Duration,
    pub worker_count: usize,
    pub workers: Vec<WorkerStats>,
    pub queue: JobStats,
    pub agents: AgentManagerStats,
}
