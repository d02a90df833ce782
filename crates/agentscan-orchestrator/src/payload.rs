// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scan parameters embedded in a queue job's payload.

use std::collections::BTreeMap;
use std::time::Duration;

use agentscan_core::AgentscanError;
use agentscan_core::types::{ScanConfig, ScanType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Queue job type tag for scan work.
pub const SCAN_JOB_TYPE: &str = "scan";

/// Everything a worker needs to run a scan without re-reading the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJobPayload {
    pub scan_job_id: Uuid,
    pub repo_url: String,
    pub branch: String,
    pub commit_sha: String,
    pub scan_type: ScanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_files: Vec<String>,
    pub agents: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ScanJobPayload {
    pub fn into_map(self) -> Result<Map<String, Value>, AgentscanError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AgentscanError::Internal(
                "scan payload did not serialize to an object".into(),
            )),
            Err(e) => Err(AgentscanError::Internal(format!(
                "failed to serialize scan payload: {e}"
            ))),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, AgentscanError> {
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| AgentscanError::Validation(format!("malformed scan job payload: {e}")))
    }

    /// Agent input for this scan. A base commit travels as the `base_sha` option.
    pub fn scan_config(&self, timeout: Duration) -> ScanConfig {
        let mut options = self.options.clone();
        if let Some(base) = &self.base_sha {
            options.insert("base_sha".to_string(), base.clone());
        }
        ScanConfig {
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            commit: self.commit_sha.clone(),
            languages: Vec::new(),
            files: self.changed_files.clone(),
            rules: Vec::new(),
            options,
            timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ScanJobPayload {
        ScanJobPayload {
            scan_job_id: Uuid::new_v4(),
            repo_url: "https://example.com/app.git".into(),
            branch: "main".into(),
            commit_sha: "abc123".into(),
            scan_type: ScanType::Incremental,
            base_sha: Some("def456".into()),
            changed_files: vec!["src/app.py".into()],
            agents: vec!["semgrep".into()],
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn payload_is_a_flat_object_keyed_by_scan_job_id() {
        let original = payload();
        let map = original.clone().into_map().unwrap();
        assert_eq!(
            map["scan_job_id"],
            Value::String(original.scan_job_id.to_string())
        );
        assert_eq!(map["scan_type"], "incremental");
        assert_eq!(ScanJobPayload::from_map(&map).unwrap(), original);
    }

    #[test]
    fn missing_scan_job_id_is_a_validation_error() {
        let mut map = payload().into_map().unwrap();
        map.remove("scan_job_id");
        let err = ScanJobPayload::from_map(&map).unwrap_err();
        assert!(matches!(err, AgentscanError::Validation(_)));
        assert!(err.to_string().contains("scan_job_id"));
    }

    #[test]
    fn scan_config_carries_changed_files_and_base() {
        let config = payload().scan_config(Duration::from_secs(60));
        assert_eq!(config.files, vec!["src/app.py".to_string()]);
        assert_eq!(config.options.get("base_sha").map(String::as_str), Some("def456"));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
