// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scan orchestration for agentscan.
//!
//! [`OrchestrationService`] accepts scan requests, records them as scan jobs,
//! and enqueues the work. A pool of [`Worker`]s drains the queue, fans each
//! scan out across the requested agents, and stores per-agent results and
//! findings.

pub mod payload;
pub mod service;
pub mod types;
pub mod worker;

pub use payload::{SCAN_JOB_TYPE, ScanJobPayload};
pub use service::{OrchestrationService, ServiceSettings};
pub use types::{
    AgentResultSummary, ResultSummary, ScanList, ScanRequest, ScanResults, ScanStatusReport,
    ScanSummary, ServiceStats, WorkerState, WorkerStats,
};
pub use worker::{JobOutcome, Worker};
