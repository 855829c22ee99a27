use anyhow::Result;
use rusqlite::params;

use super::Database;
use crate::models::CredentialSet;

impl Database {
    pub fn get_credentials(&self, project_id: i64) -> Result<CredentialSet> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT platform, field, value FROM credentials
                 WHERE project_id = ?1 ORDER BY platform, field",
            )?;
            let rows = stmt.query_map(params![project_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut set = CredentialSet::new();
            for row in rows {
                let (platform, field, value) = row?;
                set.entry(platform).or_default().insert(field, value);
            }
            Ok(set)
        })
    }

    /// Replace the project's whole credential set. Platforms missing from `set` are removed.
    pub fn replace_credentials(&self, project_id: i64, set: &CredentialSet) -> Result<()> {
        self.transaction(|conn| {
            conn.execute(
                "DELETE FROM credentials WHERE project_id = ?1",
                params![project_id],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO credentials (project_id, platform, field, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (platform, fields) in set {
                for (field, value) in fields {
                    insert.execute(params![project_id, platform, field, value])?;
                }
            }
            Ok(())
        })?;
        tracing::debug!(project_id, platforms = set.len(), "credentials replaced");
        Ok(())
    }
}
