use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, invalid_enum, now_ts, parse_ts, Database};
use crate::models::{CreateTaskInput, GenerationTask, TaskStatus};

const TASK_COLUMNS: &str = "id, project_id, platform, prompt, status, created_at, updated_at";

fn task_from_row(row: &Row) -> rusqlite::Result<GenerationTask> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(GenerationTask {
        id: row.get(0)?,
        project_id: row.get(1)?,
        platform: row.get(2)?,
        prompt: row.get(3)?,
        status: TaskStatus::from_str(&status).ok_or_else(|| invalid_enum(4, &status))?,
        created_at: parse_ts(5, &created_at)?,
        updated_at: parse_ts(6, &updated_at)?,
    })
}

impl Database {
    /// Queue a new content-generation task.
    pub fn create_task(&self, project_id: i64, input: CreateTaskInput) -> Result<GenerationTask> {
        let now = now_ts();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO generation_tasks (project_id, platform, prompt, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    project_id,
                    input.platform,
                    input.prompt,
                    TaskStatus::Queued.as_str(),
                    format_ts(&now)
                ],
            )?;
            Ok(GenerationTask {
                id: conn.last_insert_rowid(),
                project_id,
                platform: input.platform,
                prompt: input.prompt,
                status: TaskStatus::Queued,
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_task(&self, id: i64) -> Result<Option<GenerationTask>> {
        self.with_connection(|conn| {
            let task = conn
                .query_row(
                    &format!("SELECT {} FROM generation_tasks WHERE id = ?1", TASK_COLUMNS),
                    params![id],
                    task_from_row,
                )
                .optional()?;
            Ok(task)
        })
    }

    /// Tasks of a project in queue order.
    pub fn get_tasks(&self, project_id: i64) -> Result<Vec<GenerationTask>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM generation_tasks WHERE project_id = ?1 ORDER BY id",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![project_id], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    pub fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<Option<GenerationTask>> {
        let updated = self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE generation_tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), format_ts(&now_ts()), id],
            )?;
            Ok(changed > 0)
        })?;

        if !updated {
            return Ok(None);
        }
        self.get_task(id)
    }
}
