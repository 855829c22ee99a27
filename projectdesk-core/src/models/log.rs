use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log type written by the assistant when it runs something.
pub const EXECUTION_LOG_TYPE: &str = "execution";

/// Append-only entry in a project's activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    pub project_id: i64,
    #[serde(rename = "type")]
    pub log_type: String,
    pub title: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLogInput {
    #[serde(rename = "type")]
    pub log_type: String,
    pub title: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl CreateLogInput {
    pub fn execution(title: impl Into<String>, details: Option<String>) -> Self {
        Self {
            log_type: EXECUTION_LOG_TYPE.to_string(),
            title: title.into(),
            details,
        }
    }
}
