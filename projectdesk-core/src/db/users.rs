use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, now_ts, parse_ts, Database};
use crate::models::{CreateUserInput, User};

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
    })
}

impl Database {
    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let created_at = now_ts();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO users (email, display_name, created_at) VALUES (?1, ?2, ?3)",
                params![input.email, input.display_name, format_ts(&created_at)],
            )?;
            Ok(User {
                id: conn.last_insert_rowid(),
                email: input.email,
                display_name: input.display_name,
                created_at,
            })
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.with_connection(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, email, display_name, created_at FROM users WHERE id = ?1",
                    params![id],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn get_users(&self) -> Result<Vec<User>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, email, display_name, created_at FROM users ORDER BY id")?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }
}
