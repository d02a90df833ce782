// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `ScanRepository` with the same contract as the SQLite one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use agentscan_core::AgentscanError;
use agentscan_core::traits::ScanRepository;
use agentscan_core::types::{
    FindingFilter, FindingRecord, FindingStatus, Pagination, ScanFilter, ScanJob,
    ScanResultRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, ScanJob>,
    results: Vec<ScanResultRecord>,
    findings: Vec<FindingRecord>,
}

/// Scan repository backed by process memory.
///
/// `set_available(false)` makes every call fail with a storage error.
pub struct MemoryScanRepository {
    state: RwLock<State>,
    available: AtomicBool,
}

impl Default for MemoryScanRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScanRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn scan_job_count(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    fn check(&self) -> Result<(), AgentscanError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgentscanError::storage(std::io::Error::other(
                "repository offline",
            )))
        }
    }
}

#[async_trait]
impl ScanRepository for MemoryScanRepository {
    async fn create_scan_job(&self, job: &ScanJob) -> Result<(), AgentscanError> {
        self.check()?;
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(AgentscanError::Conflict(format!(
                "scan job {} already exists",
                job.id
            )));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_scan_job(&self, id: Uuid) -> Result<ScanJob, AgentscanError> {
        self.check()?;
        self.state
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| AgentscanError::not_found("scan job", id))
    }

    async fn update_scan_job(&self, job: &ScanJob) -> Result<(), AgentscanError> {
        self.check()?;
        let mut state = self.state.write().await;
        let stored = state
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| AgentscanError::not_found("scan job", job.id))?;
        stored.ensure_not_terminal()?;
        let started_at = stored.started_at.or(job.started_at);
        *stored = job.clone();
        stored.started_at = started_at;
        Ok(())
    }

    async fn delete_scan_job(&self, id: Uuid) -> Result<(), AgentscanError> {
        self.check()?;
        let mut state = self.state.write().await;
        if state.jobs.remove(&id).is_none() {
            return Err(AgentscanError::not_found("scan job", id));
        }
        state.results.retain(|r| r.scan_job_id != id);
        state.findings.retain(|f| f.scan_job_id != id);
        Ok(())
    }

    async fn list_scan_jobs(
        &self,
        filter: &ScanFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<ScanJob>, u64), AgentscanError> {
        self.check()?;
        pagination.validate()?;
        let state = self.state.read().await;
        let mut jobs: Vec<ScanJob> = state
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = jobs.len() as u64;
        let page = jobs
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.page_size as usize)
            .collect();
        Ok((page, total))
    }

    async fn create_scan_result(&self, result: &ScanResultRecord) -> Result<(), AgentscanError> {
        self.check()?;
        let mut state = self.state.write().await;
        if !state.jobs.contains_key(&result.scan_job_id) {
            return Err(AgentscanError::not_found("scan job", result.scan_job_id));
        }
        state.results.push(result.clone());
        Ok(())
    }

    async fn get_scan_results(
        &self,
        scan_job_id: Uuid,
    ) -> Result<Vec<ScanResultRecord>, AgentscanError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .results
            .iter()
            .filter(|r| r.scan_job_id == scan_job_id)
            .cloned()
            .collect())
    }

    async fn create_finding(&self, finding: &FindingRecord) -> Result<(), AgentscanError> {
        self.check()?;
        let mut state = self.state.write().await;
        if !state.results.iter().any(|r| r.id == finding.scan_result_id) {
            return Err(AgentscanError::not_found(
                "scan result",
                finding.scan_result_id,
            ));
        }
        state.findings.push(finding.clone());
        Ok(())
    }

    async fn get_findings(
        &self,
        scan_job_id: Uuid,
        filter: &FindingFilter,
    ) -> Result<Vec<FindingRecord>, AgentscanError> {
        self.check()?;
        let mut findings: Vec<FindingRecord> = self
            .state
            .read()
            .await
            .findings
            .iter()
            .filter(|f| f.scan_job_id == scan_job_id && filter.matches(f))
            .cloned()
            .collect();
        findings.sort_by(|a, b| a.file_path.cmp(&b.file_path).then(a.line.cmp(&b.line)));
        Ok(findings)
    }

    async fn update_finding_status(
        &self,
        finding_id: Uuid,
        status: FindingStatus,
    ) -> Result<(), AgentscanError> {
        self.check()?;
        let mut state = self.state.write().await;
        let finding = state
            .findings
            .iter_mut()
            .find(|f| f.id == finding_id)
            .ok_or_else(|| AgentscanError::not_found("finding", finding_id))?;
        finding.status = status;
        finding.updated_at = Utc::now();
        Ok(())
    }

    async fn health(&self) -> Result<(), AgentscanError> {
        self.check()
    }
}
