// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query filters and pagination shared by repository implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentscanError;
use crate::types::agent::{Severity, VulnCategory};
use crate::types::scan::{FindingRecord, FindingStatus, ScanJob, ScanJobStatus, ScanType};

/// Largest page size accepted by list operations.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Filter for findings of one scan job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingFilter {
    pub severity: Option<Severity>,
    pub tool: Option<String>,
    pub category: Option<VulnCategory>,
    pub status: Option<FindingStatus>,
    /// Exact file path match.
    pub file: Option<String>,
}

impl FindingFilter {
    pub fn matches(&self, finding: &FindingRecord) -> bool {
        self.severity.is_none_or(|s| finding.severity == s)
            && self.tool.as_deref().is_none_or(|t| finding.tool == t)
            && self.category.is_none_or(|c| finding.category == c)
            && self.status.is_none_or(|s| finding.status == s)
            && self.file.as_deref().is_none_or(|f| finding.file_path == f)
    }
}

/// Filter for listing scan jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub repository_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<ScanJobStatus>,
    pub scan_type: Option<ScanType>,
    /// Created at or after.
    pub since: Option<DateTime<Utc>>,
    /// Created before.
    pub until: Option<DateTime<Utc>>,
}

impl ScanFilter {
    pub fn matches(&self, job: &ScanJob) -> bool {
        self.repository_id.is_none_or(|r| job.repository_id == r)
            && self.user_id.is_none_or(|u| job.user_id == Some(u))
            && self.status.is_none_or(|s| job.status == s)
            && self.scan_type.is_none_or(|t| job.scan_type == t)
            && self.since.is_none_or(|since| job.created_at >= since)
            && self.until.is_none_or(|until| job.created_at < until)
    }
}

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Result<Self, AgentscanError> {
        let pagination = Self { page, page_size };
        pagination.validate()?;
        Ok(pagination)
    }

    pub fn validate(&self) -> Result<(), AgentscanError> {
        if self.page == 0 {
            return Err(AgentscanError::Validation("page must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AgentscanError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.page_size.max(1)))
    }
}
