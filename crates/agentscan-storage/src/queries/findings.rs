// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding rows and triage status updates.

use agentscan_core::AgentscanError;
use agentscan_core::types::{FindingFilter, FindingRecord, FindingStatus};
use chrono::{DateTime, Utc};
use rusqlite::{Row, params, params_from_iter};
use uuid::Uuid;

use crate::codec::{json, opt_json, parsed, to_json, ts};
use crate::database::{Database, map_tr_err};

const FINDING_COLUMNS: &str = "id, scan_result_id, scan_job_id, tool, rule_id, severity,
     category, title, description, file_path, line, column_number, code_snippet, confidence,
     status, fix_suggestion, references_json, created_at, updated_at";

fn row_to_finding(row: &Row<'_>) -> rusqlite::Result<FindingRecord> {
    Ok(FindingRecord {
        id: parsed(row, 0)?,
        scan_result_id: parsed(row, 1)?,
        scan_job_id: parsed(row, 2)?,
        tool: row.get(3)?,
        rule_id: row.get(4)?,
        severity: parsed(row, 5)?,
        category: parsed(row, 6)?,
        title: row.get(7)?,
        description: row.get(8)?,
        file_path: row.get(9)?,
        line: row.get(10)?,
        column: row.get(11)?,
        code_snippet: row.get(12)?,
        confidence: row.get(13)?,
        status: parsed(row, 14)?,
        fix_suggestion: opt_json(row, 15)?,
        references: json(row, 16)?,
        created_at: parsed(row, 17)?,
        updated_at: parsed(row, 18)?,
    })
}

pub async fn insert_finding(db: &Database, finding: &FindingRecord) -> Result<(), AgentscanError> {
    let finding = finding.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO findings ({FINDING_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19)"
                ),
                params![
                    finding.id.to_string(),
                    finding.scan_result_id.to_string(),
                    finding.scan_job_id.to_string(),
                    finding.tool,
                    finding.rule_id,
                    finding.severity.to_string(),
                    finding.category.to_string(),
                    finding.title,
                    finding.description,
                    finding.file_path,
                    finding.line,
                    finding.column,
                    finding.code_snippet,
                    finding.confidence,
                    finding.status.to_string(),
                    finding.fix_suggestion.as_ref().map(to_json).transpose()?,
                    to_json(&finding.references)?,
                    ts(&finding.created_at),
                    ts(&finding.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Findings of one scan job matching `filter`, ordered by file and line.
pub async fn list_findings(
    db: &Database,
    scan_job_id: Uuid,
    filter: &FindingFilter,
) -> Result<Vec<FindingRecord>, AgentscanError> {
    let mut clauses = vec!["scan_job_id = ?"];
    let mut values = vec![scan_job_id.to_string()];
    if let Some(severity) = filter.severity {
        clauses.push("severity = ?");
        values.push(severity.to_string());
    }
    if let Some(tool) = &filter.tool {
        clauses.push("tool = ?");
        values.push(tool.clone());
    }
    if let Some(category) = filter.category {
        clauses.push("category = ?");
        values.push(category.to_string());
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(status.to_string());
    }
    if let Some(file) = &filter.file {
        clauses.push("file_path = ?");
        values.push(file.clone());
    }
    let where_clause = clauses.join(" AND ");

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FINDING_COLUMNS} FROM findings WHERE {where_clause}
                 ORDER BY file_path ASC, line ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_finding)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Set the triage status of a finding. Returns `false` when it does not exist.
pub async fn update_status(
    db: &Database,
    finding_id: Uuid,
    status: FindingStatus,
    now: DateTime<Utc>,
) -> Result<bool, AgentscanError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE findings SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![finding_id.to_string(), status.to_string(), ts(&now)],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
