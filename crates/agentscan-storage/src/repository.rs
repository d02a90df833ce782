// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`ScanRepository`].

use agentscan_core::AgentscanError;
use agentscan_core::traits::ScanRepository;
use agentscan_core::types::{
    FindingFilter, FindingRecord, FindingStatus, Pagination, ScanFilter, ScanJob,
    ScanResultRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::Database;
use crate::queries;
use crate::queries::scans::UpdateOutcome;

/// Scan job, result, and finding store on the shared [`Database`].
pub struct SqliteScanRepository {
    db: Database,
}

impl SqliteScanRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ScanRepository for SqliteScanRepository {
    async fn create_scan_job(&self, job: &ScanJob) -> Result<(), AgentscanError> {
        queries::scans::insert_scan_job(&self.db, job).await
    }

    async fn get_scan_job(&self, id: Uuid) -> Result<ScanJob, AgentscanError> {
        queries::scans::get_scan_job(&self.db, id)
            .await?
            .ok_or_else(|| AgentscanError::not_found("scan job", id))
    }

    async fn update_scan_job(&self, job: &ScanJob) -> Result<(), AgentscanError> {
        match queries::scans::update_scan_job(&self.db, job).await? {
            UpdateOutcome::Updated => Ok(()),
            UpdateOutcome::Missing => Err(AgentscanError::not_found("scan job", job.id)),
            UpdateOutcome::Terminal => Err(AgentscanError::Conflict(format!(
                "scan job {} is already in a terminal state",
                job.id
            ))),
        }
    }

    async fn delete_scan_job(&self, id: Uuid) -> Result<(), AgentscanError> {
        if queries::scans::delete_scan_job(&self.db, id).await? {
            Ok(())
        } else {
            Err(AgentscanError::not_found("scan job", id))
        }
    }

    async fn list_scan_jobs(
        &self,
        filter: &ScanFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<ScanJob>, u64), AgentscanError> {
        pagination.validate()?;
        queries::scans::list_scan_jobs(&self.db, filter, pagination).await
    }

    async fn create_scan_result(&self, result: &ScanResultRecord) -> Result<(), AgentscanError> {
        queries::results::insert_result(&self.db, result).await
    }

    async fn get_scan_results(
        &self,
        scan_job_id: Uuid,
    ) -> Result<Vec<ScanResultRecord>, AgentscanError> {
        queries::results::list_results(&self.db, scan_job_id).await
    }

    async fn create_finding(&self, finding: &FindingRecord) -> Result<(), AgentscanError> {
        queries::findings::insert_finding(&self.db, finding).await
    }

    async fn get_findings(
        &self,
        scan_job_id: Uuid,
        filter: &FindingFilter,
    ) -> Result<Vec<FindingRecord>, AgentscanError> {
        queries::findings::list_findings(&self.db, scan_job_id, filter).await
    }

    async fn update_finding_status(
        &self,
        finding_id: Uuid,
        status: FindingStatus,
    ) -> Result<(), AgentscanError> {
        if queries::findings::update_status(&self.db, finding_id, status, Utc::now()).await? {
            Ok(())
        } else {
            Err(AgentscanError::not_found("finding", finding_id))
        }
    }

    async fn health(&self) -> Result<(), AgentscanError> {
        self.db.ping().await
    }
}
