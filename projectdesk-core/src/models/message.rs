use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message in a project thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The person using the dashboard.
    User,
    /// The automated assistant persona.
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Optional structured payload attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageMetadata {
    CodeBlock {
        language: String,
        filename: Option<String>,
        code: String,
    },
    Screenshot {
        url: String,
        caption: Option<String>,
    },
    TaskStatus {
        status: String,
    },
}

impl MessageMetadata {
    /// The serialized `type` tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CodeBlock { .. } => "code_block",
            Self::Screenshot { .. } => "screenshot",
            Self::TaskStatus { .. } => "task_status",
        }
    }

    pub fn is_task_status(&self) -> bool {
        matches!(self, Self::TaskStatus { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub project_id: i64,
    pub content: String,
    pub sender: Sender,
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True when the assistant authored this message and it ends with a question mark.
    pub fn is_assistant_question(&self) -> bool {
        self.sender == Sender::Assistant && self.content.trim_end().ends_with('?')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageInput {
    pub content: String,
    pub sender: Sender,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

impl CreateMessageInput {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::User,
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::Assistant,
            metadata,
        }
    }
}
