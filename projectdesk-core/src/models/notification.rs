use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LogEntry, Message, Project};

/// A row-created announcement pushed to connected clients.
///
/// Clients treat these purely as cache-invalidation hints and refetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    MessageCreated { message: Message },
    LogCreated { log: LogEntry },
    ProjectCreated { project: Project },
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message_created",
            Self::LogCreated { .. } => "log_created",
            Self::ProjectCreated { .. } => "project_created",
        }
    }

    /// Project the payload belongs to.
    pub fn project_id(&self) -> i64 {
        match self {
            Self::MessageCreated { message } => message.project_id,
            Self::LogCreated { log } => log.project_id,
            Self::ProjectCreated { project } => project.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            emitted_at: Utc::now(),
        }
    }

    pub fn message_created(message: Message) -> Self {
        Self::new(NotificationKind::MessageCreated { message })
    }

    pub fn log_created(log: LogEntry) -> Self {
        Self::new(NotificationKind::LogCreated { log })
    }

    pub fn project_created(project: Project) -> Self {
        Self::new(NotificationKind::ProjectCreated { project })
    }

    pub fn project_id(&self) -> i64 {
        self.kind.project_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;

    #[test]
    fn test_message_created_wire_shape() {
        let message = Message {
            id: 3,
            project_id: 7,
            content: "hello".into(),
            sender: Sender::User,
            metadata: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(Notification::message_created(message)).unwrap();

        assert_eq!(json["kind"], "message_created");
        assert_eq!(json["message"]["project_id"], 7);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_project_created_is_addressed_to_itself() {
        let project = Project {
            id: 11,
            name: "Launch".into(),
            prompt: String::new(),
            user_id: 1,
            created_at: Utc::now(),
            active: true,
        };
        assert_eq!(Notification::project_created(project).project_id(), 11);
    }
}
