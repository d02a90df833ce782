// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scan job CRUD and filtered listing.

use agentscan_core::AgentscanError;
use agentscan_core::types::{Pagination, ScanFilter, ScanJob};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use uuid::Uuid;

use crate::codec::{json, opt_parsed, opt_ts, parsed, to_json, ts};
use crate::database::{Database, map_tr_err};

const SCAN_COLUMNS: &str = "id, queue_job_id, repository_id, user_id, repo_url, branch,
     commit_sha, scan_type, priority, status, agents_requested, agents_completed,
     error_message, metadata, started_at, completed_at, created_at, updated_at";

const TERMINAL_STATUSES: &str = "('completed', 'failed', 'cancelled')";

fn row_to_scan(row: &Row<'_>) -> rusqlite::Result<ScanJob> {
    Ok(ScanJob {
        id: parsed(row, 0)?,
        queue_job_id: opt_parsed(row, 1)?,
        repository_id: parsed(row, 2)?,
        user_id: opt_parsed(row, 3)?,
        repo_url: row.get(4)?,
        branch: row.get(5)?,
        commit_sha: row.get(6)?,
        scan_type: parsed(row, 7)?,
        priority: row.get(8)?,
        status: parsed(row, 9)?,
        agents_requested: json(row, 10)?,
        agents_completed: json(row, 11)?,
        error_message: row.get(12)?,
        metadata: json(row, 13)?,
        started_at: opt_parsed(row, 14)?,
        completed_at: opt_parsed(row, 15)?,
        created_at: parsed(row, 16)?,
        updated_at: parsed(row, 17)?,
    })
}

pub async fn insert_scan_job(db: &Database, job: &ScanJob) -> Result<(), AgentscanError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO scan_jobs ({SCAN_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18)"
                ),
                params![
                    job.id.to_string(),
                    job.queue_job_id.map(|id| id.to_string()),
                    job.repository_id.to_string(),
                    job.user_id.map(|id| id.to_string()),
                    job.repo_url,
                    job.branch,
                    job.commit_sha,
                    job.scan_type.to_string(),
                    job.priority,
                    job.status.to_string(),
                    to_json(&job.agents_requested)?,
                    to_json(&job.agents_completed)?,
                    job.error_message,
                    to_json(&job.metadata)?,
                    opt_ts(job.started_at.as_ref()),
                    opt_ts(job.completed_at.as_ref()),
                    ts(&job.created_at),
                    ts(&job.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_scan_job(db: &Database, id: Uuid) -> Result<Option<ScanJob>, AgentscanError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SCAN_COLUMNS} FROM scan_jobs WHERE id = ?1"),
                params![id.to_string()],
                row_to_scan,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome of a guarded scan job update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Missing,
    /// The stored row was already terminal and was left untouched.
    Terminal,
}

/// Overwrite the mutable fields of a scan job unless the stored row is terminal.
///
/// A stored `started_at` is never replaced, so a stale copy written after
/// the job started cannot clear it.
pub async fn update_scan_job(db: &Database, job: &ScanJob) -> Result<UpdateOutcome, AgentscanError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = job.id.to_string();
            let changed = tx.execute(
                &format!(
                    "UPDATE scan_jobs SET queue_job_id = ?2, status = ?3, agents_completed = ?4,
                     error_message = ?5, metadata = ?6, started_at = COALESCE(started_at, ?7),
                     completed_at = ?8,
                     updated_at = ?9
                     WHERE id = ?1 AND status NOT IN {TERMINAL_STATUSES}"
                ),
                params![
                    id,
                    job.queue_job_id.map(|id| id.to_string()),
                    job.status.to_string(),
                    to_json(&job.agents_completed)?,
                    job.error_message,
                    to_json(&job.metadata)?,
                    opt_ts(job.started_at.as_ref()),
                    opt_ts(job.completed_at.as_ref()),
                    ts(&job.updated_at),
                ],
            )?;

            let outcome = if changed > 0 {
                UpdateOutcome::Updated
            } else {
                let exists: Option<i64> = tx
                    .query_row("SELECT 1 FROM scan_jobs WHERE id = ?1", params![id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                match exists {
                    Some(_) => UpdateOutcome::Terminal,
                    None => UpdateOutcome::Missing,
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a scan job and, through cascading keys, its results and findings.
pub async fn delete_scan_job(db: &Database, id: Uuid) -> Result<bool, AgentscanError> {
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM scan_jobs WHERE id = ?1", params![id.to_string()])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// One page of scan jobs matching `filter`, newest first, plus the total count.
pub async fn list_scan_jobs(
    db: &Database,
    filter: &ScanFilter,
    pagination: &Pagination,
) -> Result<(Vec<ScanJob>, u64), AgentscanError> {
    let mut clauses: Vec<&'static str> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    if let Some(repository_id) = filter.repository_id {
        clauses.push("repository_id = ?");
        values.push(repository_id.to_string());
    }
    if let Some(user_id) = filter.user_id {
        clauses.push("user_id = ?");
        values.push(user_id.to_string());
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(status.to_string());
    }
    if let Some(scan_type) = filter.scan_type {
        clauses.push("scan_type = ?");
        values.push(scan_type.to_string());
    }
    if let Some(since) = &filter.since {
        clauses.push("created_at >= ?");
        values.push(ts(since));
    }
    if let Some(until) = &filter.until {
        clauses.push("created_at < ?");
        values.push(ts(until));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let limit = i64::from(pagination.page_size);
    let offset = i64::try_from(pagination.offset()).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| {
            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM scan_jobs {where_clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {SCAN_COLUMNS} FROM scan_jobs {where_clause}
                 ORDER BY created_at DESC, id ASC
                 LIMIT {limit} OFFSET {offset}"
            ))?;
            let jobs = stmt
                .query_map(params_from_iter(values.iter()), row_to_scan)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((jobs, total))
        })
        .await
        .map_err(map_tr_err)
}
