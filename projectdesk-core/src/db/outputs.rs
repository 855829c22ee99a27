use anyhow::Result;
use rusqlite::{params, Row};

use super::{format_ts, now_ts, parse_ts, Database};
use crate::models::{CreateOutputInput, Output};

fn output_from_row(row: &Row) -> rusqlite::Result<Output> {
    let created_at: String = row.get(5)?;
    Ok(Output {
        id: row.get(0)?,
        project_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

impl Database {
    pub fn create_output(&self, project_id: i64, input: CreateOutputInput) -> Result<Output> {
        let created_at = now_ts();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO outputs (project_id, kind, title, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project_id,
                    input.kind,
                    input.title,
                    input.content,
                    format_ts(&created_at)
                ],
            )?;
            Ok(Output {
                id: conn.last_insert_rowid(),
                project_id,
                kind: input.kind,
                title: input.title,
                content: input.content,
                created_at,
            })
        })
    }

    pub fn get_outputs(&self, project_id: i64) -> Result<Vec<Output>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, kind, title, content, created_at
                 FROM outputs WHERE project_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let outputs = stmt
                .query_map(params![project_id], output_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(outputs)
        })
    }
}
