use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generated content produced for a project (an article, a post, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    pub id: i64,
    pub project_id: i64,
    pub kind: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOutputInput {
    pub kind: String,
    pub title: String,
    pub content: String,
}
