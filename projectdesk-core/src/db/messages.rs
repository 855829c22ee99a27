use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{format_ts, invalid_enum, now_ts, parse_ts, stored_ts, Database};
use crate::models::{CreateMessageInput, Message, MessageMetadata, Sender};

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let sender: String = row.get(3)?;
    let metadata: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;

    let metadata = metadata
        .map(|raw| serde_json::from_str::<MessageMetadata>(&raw))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: row.get(0)?,
        project_id: row.get(1)?,
        content: row.get(2)?,
        sender: Sender::from_str(&sender).ok_or_else(|| invalid_enum(3, &sender))?,
        metadata,
        created_at: parse_ts(5, &created_at)?,
    })
}

impl Database {
    pub fn create_message(&self, project_id: i64, input: CreateMessageInput) -> Result<Message> {
        self.create_message_at(project_id, input, now_ts())
    }

    /// Insert a message with an explicit timestamp (imports and fixtures).
    pub fn create_message_at(
        &self,
        project_id: i64,
        input: CreateMessageInput,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        let created_at = stored_ts(created_at);
        let metadata = input
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO messages (project_id, content, sender, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project_id,
                    input.content,
                    input.sender.as_str(),
                    metadata,
                    format_ts(&created_at)
                ],
            )?;
            Ok(Message {
                id: conn.last_insert_rowid(),
                project_id,
                content: input.content,
                sender: input.sender,
                metadata: input.metadata,
                created_at,
            })
        })
    }

    /// Messages of a project, oldest first.
    pub fn get_messages(&self, project_id: i64) -> Result<Vec<Message>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, content, sender, metadata, created_at
                 FROM messages WHERE project_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let messages = stmt
                .query_map(params![project_id], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
    }
}
