use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, now_ts, parse_ts, Database};
use crate::models::{CreateProjectInput, Project, UpdateProjectInput};

const PROJECT_COLUMNS: &str = "id, name, prompt, user_id, active, created_at";

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    let created_at: String = row.get(5)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt: row.get(2)?,
        user_id: row.get(3)?,
        active: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

impl Database {
    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        let created_at = now_ts();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO projects (name, prompt, user_id, active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
                params![input.name, input.prompt, input.user_id, format_ts(&created_at)],
            )?;
            Ok(Project {
                id: conn.last_insert_rowid(),
                name: input.name,
                prompt: input.prompt,
                user_id: input.user_id,
                created_at,
                active: true,
            })
        })
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.with_connection(|conn| {
            let project = conn
                .query_row(
                    &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
                    params![id],
                    project_from_row,
                )
                .optional()?;
            Ok(project)
        })
    }

    /// All projects, newest first. Inactive projects are included.
    pub fn get_projects(&self, user_id: Option<i64>) -> Result<Vec<Project>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM projects WHERE (?1 IS NULL OR user_id = ?1) ORDER BY created_at DESC, id DESC",
                PROJECT_COLUMNS
            ))?;
            let projects = stmt
                .query_map(params![user_id], project_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// Returns the updated project, or `None` if it does not exist.
    pub fn update_project(&self, id: i64, input: UpdateProjectInput) -> Result<Option<Project>> {
        let updated = self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE projects SET
                    name = COALESCE(?1, name),
                    prompt = COALESCE(?2, prompt),
                    active = COALESCE(?3, active)
                 WHERE id = ?4",
                params![input.name, input.prompt, input.active, id],
            )?;
            Ok(changed > 0)
        })?;

        if !updated {
            return Ok(None);
        }
        self.get_project(id)
    }
}
