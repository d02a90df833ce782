// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the orchestration engine.

pub mod agent;
pub mod filter;
pub mod job;
pub mod scan;

pub use agent::{
    AgentConfig, AgentFinding, AgentHealth, FixSuggestion, HealthState, ScanConfig, ScanMetadata,
    ScanOutput, Severity, VulnCategory,
};
pub use filter::{FindingFilter, Pagination, ScanFilter};
pub use job::{
    CleanupReport, FailureDisposition, JobFilter, JobId, JobResult, JobStats, JobStatus, Priority,
    QueueJob,
};
pub use scan::{
    FindingRecord, FindingStatus, ScanJob, ScanJobStatus, ScanResultRecord, ScanResultStatus,
    ScanType,
};
