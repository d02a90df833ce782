// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-agent scan result rows. Results are written once and never updated.

use agentscan_core::AgentscanError;
use agentscan_core::types::ScanResultRecord;
use rusqlite::{Row, params};
use uuid::Uuid;

use crate::codec::{from_millis, millis, opt_json, parsed, to_json, ts};
use crate::database::{Database, map_tr_err};

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<ScanResultRecord> {
    let findings_count: i64 = row.get(4)?;
    Ok(ScanResultRecord {
        id: parsed(row, 0)?,
        scan_job_id: parsed(row, 1)?,
        agent_name: row.get(2)?,
        status: parsed(row, 3)?,
        findings_count: usize::try_from(findings_count).unwrap_or_default(),
        duration: from_millis(row.get(5)?),
        error_message: row.get(6)?,
        raw_output: opt_json(row, 7)?,
        created_at: parsed(row, 8)?,
    })
}

pub async fn insert_result(db: &Database, result: &ScanResultRecord) -> Result<(), AgentscanError> {
    let result = result.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scan_results (id, scan_job_id, agent_name, status, findings_count,
                 duration_ms, error_message, raw_output, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    result.id.to_string(),
                    result.scan_job_id.to_string(),
                    result.agent_name,
                    result.status.to_string(),
                    i64::try_from(result.findings_count).unwrap_or(i64::MAX),
                    millis(result.duration),
                    result.error_message,
                    result.raw_output.as_ref().map(to_json).transpose()?,
                    ts(&result.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Results of one scan job in creation order.
pub async fn list_results(
    db: &Database,
    scan_job_id: Uuid,
) -> Result<Vec<ScanResultRecord>, AgentscanError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, scan_job_id, agent_name, status, findings_count, duration_ms,
                        error_message, raw_output, created_at
                 FROM scan_results WHERE scan_job_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![scan_job_id.to_string()], row_to_result)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
