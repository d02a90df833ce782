// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence contract for scan jobs, scan results, and findings.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AgentscanError;
use crate::types::filter::{FindingFilter, Pagination, ScanFilter};
use crate::types::scan::{FindingRecord, FindingStatus, ScanJob, ScanResultRecord};

/// Opaque store for the scan domain records.
#[async_trait]
pub trait ScanRepository: Send + Sync {
    async fn create_scan_job(&self, job: &ScanJob) -> Result<(), AgentscanError>;

    async fn get_scan_job(&self, id: Uuid) -> Result<ScanJob, AgentscanError>;

    /// Overwrite a scan job.
    ///
    /// Fails with [`AgentscanError::Conflict`] when the stored record is
    /// already terminal, so terminal fields are written exactly once. A
    /// stored `started_at` is kept even when `job` carries none.
    async fn update_scan_job(&self, job: &ScanJob) -> Result<(), AgentscanError>;

    async fn delete_scan_job(&self, id: Uuid) -> Result<(), AgentscanError>;

    /// One page of scan jobs, newest first, plus the total match count.
    async fn list_scan_jobs(
        &self,
        filter: &ScanFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<ScanJob>, u64), AgentscanError>;

    async fn create_scan_result(&self, result: &ScanResultRecord) -> Result<(), AgentscanError>;

    async fn get_scan_results(&self, scan_job_id: Uuid)
    -> Result<Vec<ScanResultRecord>, AgentscanError>;

    async fn create_finding(&self, finding: &FindingRecord) -> Result<(), AgentscanError>;

    async fn get_findings(
        &self,
        scan_job_id: Uuid,
        filter: &FindingFilter,
    ) -> Result<Vec<FindingRecord>, AgentscanError>;

    async fn update_finding_status(
        &self,
        finding_id: Uuid,
        status: FindingStatus,
    ) -> Result<(), AgentscanError>;

    async fn health(&self) -> Result<(), AgentscanError>;
}
