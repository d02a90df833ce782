// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client subcommands that read or change the shared store.
//!
//! Each command builds a stopped service over the configured database and
//! prints its answer as pretty JSON on stdout.

use std::collections::BTreeMap;
use std::time::Duration;

use agentscan_config::AgentscanConfig;
use agentscan_core::AgentscanError;
use agentscan_core::types::{
    FindingFilter, FindingStatus, Pagination, ScanFilter, ScanJobStatus, ScanType, Severity,
    VulnCategory,
};
use agentscan_orchestrator::ScanRequest;
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::engine;

/// Arguments of `agentscan submit`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Repository URL to scan.
    #[arg(long)]
    pub repo_url: String,
    #[arg(long, default_value = "main")]
    pub branch: String,
    /// Commit to scan.
    #[arg(long)]
    pub commit: String,
    /// Repository identifier; a fresh one is generated when omitted.
    #[arg(long)]
    pub repository_id: Option<Uuid>,
    #[arg(long)]
    pub user_id: Option<Uuid>,
    /// full, incremental, or ide.
    #[arg(long, default_value = "full")]
    pub scan_type: String,
    /// Base commit of an incremental scan.
    #[arg(long)]
    pub base_sha: Option<String>,
    /// Changed file of an incremental scan (repeatable).
    #[arg(long = "changed-file")]
    pub changed_files: Vec<String>,
    /// 1 (lowest) to 10 (highest).
    #[arg(long, default_value_t = 5)]
    pub priority: i32,
    /// Agent to run (repeatable).
    #[arg(long = "agent", required = true)]
    pub agents: Vec<String>,
    /// Agent option as key=value (repeatable).
    #[arg(long = "option", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
    /// Overall scan deadline in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long)]
    pub callback_url: Option<String>,
}

/// Arguments of `agentscan results`.
#[derive(Args, Debug)]
pub struct ResultsArgs {
    pub scan_id: String,
    #[arg(long)]
    pub severity: Option<Severity>,
    #[arg(long)]
    pub tool: Option<String>,
    #[arg(long)]
    pub category: Option<VulnCategory>,
    #[arg(long)]
    pub status: Option<FindingStatus>,
    #[arg(long)]
    pub file: Option<String>,
}

/// Arguments of `agentscan list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub repository_id: Option<Uuid>,
    #[arg(long)]
    pub user_id: Option<Uuid>,
    #[arg(long)]
    pub status: Option<ScanJobStatus>,
    #[arg(long)]
    pub scan_type: Option<ScanType>,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = 20)]
    pub page_size: u32,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), AgentscanError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AgentscanError::Internal(format!("failed to render output: {e}")))?;
    println!("{json}");
    Ok(())
}

impl SubmitArgs {
    fn into_request(self) -> ScanRequest {
        ScanRequest {
            repository_id: self.repository_id.unwrap_or_else(Uuid::new_v4),
            user_id: self.user_id,
            repo_url: self.repo_url,
            branch: self.branch,
            commit_sha: self.commit,
            base_sha: self.base_sha,
            changed_files: self.changed_files,
            scan_type: self.scan_type,
            priority: self.priority,
            agents: self.agents,
            options: self.options.into_iter().collect::<BTreeMap<_, _>>(),
            timeout: self.timeout_secs.map(Duration::from_secs),
            callback_url: self.callback_url,
            metadata: BTreeMap::new(),
        }
    }
}

pub async fn submit(config: &AgentscanConfig, args: SubmitArgs) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    let scan_id = service.submit_scan(args.into_request()).await?;
    print_json(&serde_json::json!({ "scan_id": scan_id, "status": ScanJobStatus::Queued }))
}

pub async fn status(config: &AgentscanConfig, scan_id: &str) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    print_json(&service.get_scan_status(scan_id).await?)
}

pub async fn results(config: &AgentscanConfig, args: ResultsArgs) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    let filter = FindingFilter {
        severity: args.severity,
        tool: args.tool,
        category: args.category,
        status: args.status,
        file: args.file,
    };
    print_json(&service.get_scan_results(&args.scan_id, &filter).await?)
}

pub async fn cancel(config: &AgentscanConfig, scan_id: &str) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    service.cancel_scan(scan_id).await?;
    print_json(&serde_json::json!({ "scan_id": scan_id, "status": ScanJobStatus::Cancelled }))
}

pub async fn list(config: &AgentscanConfig, args: ListArgs) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    let filter = ScanFilter {
        repository_id: args.repository_id,
        user_id: args.user_id,
        status: args.status,
        scan_type: args.scan_type,
        ..ScanFilter::default()
    };
    let pagination = Pagination::new(args.page, args.page_size)?;
    print_json(&service.list_scans(&filter, &pagination).await?)
}

pub async fn queue_stats(config: &AgentscanConfig) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    print_json(&service.queue().stats().await?)
}

/// Probe every configured agent once and print the registry.
pub async fn agents(config: &AgentscanConfig) -> Result<(), AgentscanError> {
    let service = engine::open(config).await?;
    // Individual failures show up in the per-agent health below.
    let _ = service.agents().health_check_all().await;
    print_json(&service.agents().stats().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_options_parse() {
        assert_eq!(
            parse_key_value("ruleset=p/owasp").unwrap(),
            ("ruleset".to_string(), "p/owasp".to_string())
        );
        assert_eq!(
            parse_key_value("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn submit_args_fill_a_request() {
        let args = SubmitArgs {
            repo_url: "https://example.com/app.git".into(),
            branch: "main".into(),
            commit: "abc".into(),
            repository_id: None,
            user_id: None,
            scan_type: "incremental".into(),
            base_sha: Some("def".into()),
            changed_files: vec!["src/a.py".into()],
            priority: 9,
            agents: vec!["semgrep".into()],
            options: vec![("ruleset".into(), "auto".into())],
            timeout_secs: Some(90),
            callback_url: None,
        };
        let request = args.into_request();
        assert!(!request.repository_id.is_nil());
        assert_eq!(request.commit_sha, "abc");
        assert_eq!(request.timeout, Some(Duration::from_secs(90)));
        assert_eq!(request.options.get("ruleset").map(String::as_str), Some("auto"));
    }
}
