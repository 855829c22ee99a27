use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, invalid_enum, now_ts, parse_ts, Database};
use crate::models::{
    CreateFeatureInput, CreateGoalInput, CreateMilestoneInput, Feature, Goal, Milestone,
    PlanStatus,
};

fn status_at(row: &Row, idx: usize) -> rusqlite::Result<PlanStatus> {
    let raw: String = row.get(idx)?;
    PlanStatus::from_str(&raw).ok_or_else(|| invalid_enum(idx, &raw))
}

fn feature_from_row(row: &Row) -> rusqlite::Result<Feature> {
    let created_at: String = row.get(5)?;
    Ok(Feature {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: status_at(row, 4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

fn milestone_from_row(row: &Row) -> rusqlite::Result<Milestone> {
    let due_date: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    let due_date = due_date
        .map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(Milestone {
        id: row.get(0)?,
        feature_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: status_at(row, 4)?,
        due_date,
        created_at: parse_ts(6, &created_at)?,
    })
}

fn goal_from_row(row: &Row) -> rusqlite::Result<Goal> {
    let created_at: String = row.get(5)?;
    Ok(Goal {
        id: row.get(0)?,
        milestone_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: status_at(row, 4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

impl Database {
    // Features

    pub fn create_feature(&self, project_id: i64, input: CreateFeatureInput) -> Result<Feature> {
        let created_at = now_ts();
        let status = input.status.unwrap_or_default();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO features (project_id, title, description, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project_id,
                    input.title,
                    input.description,
                    status.as_str(),
                    format_ts(&created_at)
                ],
            )?;
            Ok(Feature {
                id: conn.last_insert_rowid(),
                project_id,
                title: input.title,
                description: input.description,
                status,
                created_at,
            })
        })
    }

    pub fn get_features(&self, project_id: i64) -> Result<Vec<Feature>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, title, description, status, created_at
                 FROM features WHERE project_id = ?1 ORDER BY id",
            )?;
            let features = stmt
                .query_map(params![project_id], feature_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(features)
        })
    }

    pub fn get_feature(&self, id: i64) -> Result<Option<Feature>> {
        self.with_connection(|conn| {
            let feature = conn
                .query_row(
                    "SELECT id, project_id, title, description, status, created_at
                     FROM features WHERE id = ?1",
                    params![id],
                    feature_from_row,
                )
                .optional()?;
            Ok(feature)
        })
    }

    // Milestones

    pub fn create_milestone(
        &self,
        feature_id: i64,
        input: CreateMilestoneInput,
    ) -> Result<Milestone> {
        let created_at = now_ts();
        let status = input.status.unwrap_or_default();
        let due_date = input.due_date.map(|d| d.format("%Y-%m-%d").to_string());
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO milestones (feature_id, title, description, status, due_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    feature_id,
                    input.title,
                    input.description,
                    status.as_str(),
                    due_date,
                    format_ts(&created_at)
                ],
            )?;
            Ok(Milestone {
                id: conn.last_insert_rowid(),
                feature_id,
                title: input.title,
                description: input.description,
                status,
                due_date: input.due_date,
                created_at,
            })
        })
    }

    pub fn get_milestones(&self, feature_id: i64) -> Result<Vec<Milestone>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, feature_id, title, description, status, due_date, created_at
                 FROM milestones WHERE feature_id = ?1 ORDER BY id",
            )?;
            let milestones = stmt
                .query_map(params![feature_id], milestone_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(milestones)
        })
    }

    pub fn get_milestone(&self, id: i64) -> Result<Option<Milestone>> {
        self.with_connection(|conn| {
            let milestone = conn
                .query_row(
                    "SELECT id, feature_id, title, description, status, due_date, created_at
                     FROM milestones WHERE id = ?1",
                    params![id],
                    milestone_from_row,
                )
                .optional()?;
            Ok(milestone)
        })
    }

    // Goals

    pub fn create_goal(&self, milestone_id: i64, input: CreateGoalInput) -> Result<Goal> {
        let created_at = now_ts();
        let status = input.status.unwrap_or_default();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO goals (milestone_id, title, description, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    milestone_id,
                    input.title,
                    input.description,
                    status.as_str(),
                    format_ts(&created_at)
                ],
            )?;
            Ok(Goal {
                id: conn.last_insert_rowid(),
                milestone_id,
                title: input.title,
                description: input.description,
                status,
                created_at,
            })
        })
    }

    pub fn get_goals(&self, milestone_id: i64) -> Result<Vec<Goal>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, milestone_id, title, description, status, created_at
                 FROM goals WHERE milestone_id = ?1 ORDER BY id",
            )?;
            let goals = stmt
                .query_map(params![milestone_id], goal_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(goals)
        })
    }

    /// Returns false if the goal does not exist.
    pub fn update_goal_status(&self, id: i64, status: PlanStatus) -> Result<bool> {
        self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE goals SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            Ok(changed > 0)
        })
    }
}
