//! Runtime configuration.
//!
//! Values come from CLI flags with environment fallbacks (see `main.rs`);
//! these structs carry the resolved settings into the library.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::db::Database;

/// Text posted on the assistant's behalf when its question goes unanswered.
pub const FOLLOW_UP_TEXT: &str = "I noticed there's been no response for a while. \
I'll proceed with the most reasonable approach based on our previous discussions.";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` uses [`Database::default_path`].
    pub database: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database: None,
        }
    }
}

impl ServerConfig {
    /// Bind the listen socket. `host` may be a name such as `localhost`.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("failed to bind {}:{}", self.host, self.port))
    }

    /// Open and migrate the configured database.
    pub fn open_database(&self) -> Result<Database> {
        let db = match &self.database {
            Some(path) => Database::open(path)?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }
}

/// Tuning for [`ProjectSync`](crate::sync::ProjectSync).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long an assistant question may sit unanswered.
    pub stale_after: Duration,
    /// Delay between detecting a stale question and posting the follow-up.
    pub follow_up_delay: Duration,
    /// How often the policy is re-run while nothing changes.
    pub recheck_interval: Duration,
    pub follow_up_text: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(2 * 60 * 60),
            follow_up_delay: Duration::from_secs(1),
            recheck_interval: Duration::from_secs(5 * 60),
            follow_up_text: FOLLOW_UP_TEXT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.stale_after, Duration::from_secs(7200));
        assert!(config.follow_up_text.starts_with("I noticed there's been no response"));
        assert!(!config.follow_up_text.ends_with('?'));
    }

    #[tokio::test]
    async fn test_bind_resolves_host_names() {
        let config = ServerConfig {
            host: "localhost".into(),
            port: 0,
            ..Default::default()
        };

        let listener = config.bind().await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_reports_bad_hosts() {
        let config = ServerConfig {
            host: "not a host".into(),
            port: 0,
            ..Default::default()
        };

        let err = config.bind().await.unwrap_err();
        assert!(err.to_string().contains("not a host:0"));
    }

    #[test]
    fn test_open_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("projectdesk.db");
        let config = ServerConfig {
            database: Some(path.clone()),
            ..Default::default()
        };

        let db = config.open_database().unwrap();
        assert!(path.exists());
        assert!(db.get_projects(None).unwrap().is_empty());
    }
}
