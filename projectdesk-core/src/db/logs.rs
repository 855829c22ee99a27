use anyhow::Result;
use rusqlite::{params, Row};

use super::{format_ts, now_ts, parse_ts, Database};
use crate::models::{CreateLogInput, LogEntry};

fn log_from_row(row: &Row) -> rusqlite::Result<LogEntry> {
    let created_at: String = row.get(5)?;
    Ok(LogEntry {
        id: row.get(0)?,
        project_id: row.get(1)?,
        log_type: row.get(2)?,
        title: row.get(3)?,
        details: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

impl Database {
    pub fn create_log(&self, project_id: i64, input: CreateLogInput) -> Result<LogEntry> {
        let created_at = now_ts();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO logs (project_id, type, title, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project_id,
                    input.log_type,
                    input.title,
                    input.details,
                    format_ts(&created_at)
                ],
            )?;
            Ok(LogEntry {
                id: conn.last_insert_rowid(),
                project_id,
                log_type: input.log_type,
                title: input.title,
                details: input.details,
                created_at,
            })
        })
    }

    /// Logs of a project, oldest first.
    pub fn get_logs(&self, project_id: i64) -> Result<Vec<LogEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, type, title, details, created_at
                 FROM logs WHERE project_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let logs = stmt
                .query_map(params![project_id], log_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(logs)
        })
    }
}
