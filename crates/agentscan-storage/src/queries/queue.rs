// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue job rows: insert, atomic claim, read-modify-write, and maintenance.

use agentscan_core::AgentscanError;
use agentscan_core::types::{
    CleanupReport, FailureDisposition, JobId, JobStats, JobStatus, Priority, QueueJob,
};
use agentscan_queue::{QueueSettings, apply_failure};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::codec::{from_millis, json, millis, opt_json, opt_parsed, opt_ts, parsed, to_json, ts};
use crate::database::{Database, map_tr_err};

const JOB_COLUMNS: &str = "id, job_type, priority, payload, status, attempt, max_attempts,
     retry_delay_ms, timeout_ms, scheduled_at, tags, worker_id, started_at,
     error_message, result, created_at, updated_at";

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<QueueJob> {
    let weight: i64 = row.get(2)?;
    let priority = Priority::from_weight(weight)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(2, weight))?;
    Ok(QueueJob {
        id: parsed(row, 0)?,
        job_type: row.get(1)?,
        priority,
        payload: json(row, 3)?,
        status: parsed(row, 4)?,
        attempt: row.get(5)?,
        max_attempts: row.get(6)?,
        retry_delay: from_millis(row.get(7)?),
        timeout: from_millis(row.get(8)?),
        scheduled_at: opt_parsed(row, 9)?,
        tags: json(row, 10)?,
        worker_id: row.get(11)?,
        started_at: opt_parsed(row, 12)?,
        error_message: row.get(13)?,
        result: opt_json(row, 14)?,
        created_at: parsed(row, 15)?,
        updated_at: parsed(row, 16)?,
    })
}

fn load(conn: &Connection, id: &str) -> rusqlite::Result<Option<QueueJob>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM queue_jobs WHERE id = ?1"),
        params![id],
        row_to_job,
    )
    .optional()
}

/// Write every mutable column of `job` back to its row.
///
/// `ready_at` only moves when the job starts waiting for a future time;
/// otherwise a job keeps its place from enqueue or promotion.
fn store(conn: &Connection, job: &QueueJob) -> rusqlite::Result<()> {
    let waiting_until = match job.status {
        JobStatus::Scheduled | JobStatus::Retrying => job.scheduled_at,
        _ => None,
    };
    conn.execute(
        "UPDATE queue_jobs SET status = ?2, attempt = ?3, scheduled_at = ?4,
         ready_at = COALESCE(?5, ready_at),
         worker_id = ?6, started_at = ?7, error_message = ?8, result = ?9, updated_at = ?10
         WHERE id = ?1",
        params![
            job.id.to_string(),
            job.status.to_string(),
            job.attempt,
            opt_ts(job.scheduled_at.as_ref()),
            opt_ts(waiting_until.as_ref()),
            job.worker_id,
            opt_ts(job.started_at.as_ref()),
            job.error_message,
            job.result.as_ref().map(to_json).transpose()?,
            ts(&job.updated_at),
        ],
    )?;
    Ok(())
}

/// Move due scheduled and retrying jobs to `queued`.
fn promote_due(conn: &Connection, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE queue_jobs SET status = 'queued', updated_at = ?1
         WHERE status IN ('scheduled', 'retrying') AND ready_at <= ?1",
        params![now],
    )
}

/// Insert a job, replacing any row with the same id.
///
/// `ready_at` orders the job inside its tier; pass the enqueue time or a
/// future schedule.
pub async fn insert(
    db: &Database,
    job: QueueJob,
    ready_at: DateTime<Utc>,
) -> Result<(), AgentscanError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO queue_jobs (id, job_type, priority, payload, status,
                 attempt, max_attempts, retry_delay_ms, timeout_ms, scheduled_at, ready_at, tags,
                 worker_id, started_at, error_message, result, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18)",
                params![
                    job.id.to_string(),
                    job.job_type,
                    job.priority.weight(),
                    to_json(&job.payload)?,
                    job.status.to_string(),
                    job.attempt,
                    job.max_attempts,
                    millis(job.retry_delay),
                    millis(job.timeout),
                    opt_ts(job.scheduled_at.as_ref()),
                    ts(&ready_at),
                    to_json(&job.tags)?,
                    job.worker_id,
                    opt_ts(job.started_at.as_ref()),
                    job.error_message,
                    job.result.as_ref().map(to_json).transpose()?,
                    ts(&job.created_at),
                    ts(&job.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim the best eligible job for `worker_id`.
///
/// Promotion of due jobs, selection, and the claim run in one transaction.
pub async fn claim_next(
    db: &Database,
    worker_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<QueueJob>, AgentscanError> {
    let worker_id = worker_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now_text = ts(&now);
            promote_due(&tx, &now_text)?;

            let next = tx
                .query_row(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM queue_jobs
                         WHERE status = 'queued'
                         ORDER BY priority DESC, ready_at ASC, seq ASC
                         LIMIT 1"
                    ),
                    [],
                    row_to_job,
                )
                .optional()?;

            let claimed = match next {
                Some(mut job) => {
                    job.status = JobStatus::Running;
                    job.worker_id = Some(worker_id);
                    job.started_at = Some(now);
                    job.updated_at = now;
                    store(&tx, &job)?;
                    Some(job)
                }
                None => None,
            };
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: JobId) -> Result<Option<QueueJob>, AgentscanError> {
    db.connection()
        .call(move |conn| load(conn, &id.to_string()))
        .await
        .map_err(map_tr_err)
}

/// Read-modify-write of one job inside a transaction.
///
/// `change` decides the transition; the row is written back only when it
/// returns `Ok`.
pub async fn modify<F, R>(db: &Database, id: JobId, change: F) -> Result<R, AgentscanError>
where
    F: FnOnce(&mut QueueJob) -> Result<R, AgentscanError> + Send + 'static,
    R: Send + 'static,
{
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(mut job) = load(&tx, &id.to_string())? else {
                return Ok(None);
            };
            let outcome = change(&mut job);
            if outcome.is_ok() {
                store(&tx, &job)?;
            }
            tx.commit()?;
            Ok(Some(outcome))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.ok_or_else(|| AgentscanError::not_found("queue job", id))?
}

/// All jobs, optionally restricted to one status, oldest first.
pub async fn list(
    db: &Database,
    status: Option<JobStatus>,
) -> Result<Vec<QueueJob>, AgentscanError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut jobs = Vec::new();
            match &status {
                Some(status) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {JOB_COLUMNS} FROM queue_jobs WHERE status = ?1
                         ORDER BY created_at ASC, seq ASC"
                    ))?;
                    for job in stmt.query_map(params![status], row_to_job)? {
                        jobs.push(job?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {JOB_COLUMNS} FROM queue_jobs ORDER BY created_at ASC, seq ASC"
                    ))?;
                    for job in stmt.query_map([], row_to_job)? {
                        jobs.push(job?);
                    }
                }
            }
            Ok(jobs)
        })
        .await
        .map_err(map_tr_err)
}

/// Counts grouped by status and priority tier.
pub async fn stats(db: &Database) -> Result<JobStats, AgentscanError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, priority, COUNT(*) FROM queue_jobs GROUP BY status, priority",
            )?;
            let rows = stmt.query_map([], |row| {
                let status: JobStatus = parsed(row, 0)?;
                let weight: i64 = row.get(1)?;
                let priority = Priority::from_weight(weight)
                    .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, weight))?;
                let count: u64 = row.get(2)?;
                Ok((status, priority, count))
            })?;

            let mut stats = JobStats::default();
            for row in rows {
                let (status, priority, count) = row?;
                stats.record(status, priority, count);
            }
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}

/// One maintenance pass: expire abandoned claims, promote due jobs, purge
/// finished jobs older than the retention window.
pub async fn cleanup(
    db: &Database,
    settings: QueueSettings,
    now: DateTime<Utc>,
) -> Result<(CleanupReport, Vec<(JobId, FailureDisposition)>), AgentscanError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut report = CleanupReport::default();

            let running: Vec<QueueJob> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM queue_jobs WHERE status = 'running'"
                ))?;
                let rows = stmt.query_map([], row_to_job)?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut expired = Vec::new();
            for mut job in running {
                if !job.is_expired(now, settings.lease_grace) {
                    continue;
                }
                let disposition = apply_failure(&mut job, "job timeout", &settings, now);
                store(&tx, &job)?;
                expired.push((job.id, disposition));
            }
            report.expired = expired.len();

            let now_text = ts(&now);
            report.promoted = promote_due(&tx, &now_text)?;

            if let Some(cutoff) = chrono::Duration::from_std(settings.retention)
                .ok()
                .and_then(|retention| now.checked_sub_signed(retention))
            {
                report.purged = tx.execute(
                    "DELETE FROM queue_jobs
                     WHERE status IN ('completed', 'cancelled') AND updated_at < ?1",
                    params![ts(&cutoff)],
                )?;
            }

            tx.commit()?;
            Ok((report, expired))
        })
        .await
        .map_err(map_tr_err)
}
