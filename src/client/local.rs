use async_trait::async_trait;

use super::{ClientError, ClientResult, ProjectApi};
use crate::db::Database;
use crate::models::{
    CreateLogInput, CreateMessageInput, CreateProjectInput, CredentialSet, LogEntry, Message,
    Notification, Project,
};
use crate::notify::NotificationBus;

/// In-process [`ProjectApi`]: database writes followed by a bus notification.
///
/// The HTTP server routes its creates through this too, so every write path
/// announces itself the same way.
#[derive(Clone)]
pub struct LocalApi {
    db: Database,
    bus: NotificationBus,
}

impl LocalApi {
    pub fn new(db: Database, bus: NotificationBus) -> Self {
        Self { db, bus }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    fn require_project(&self, project_id: i64) -> ClientResult<Project> {
        self.db
            .get_project(project_id)?
            .ok_or_else(|| ClientError::NotFound(format!("project {}", project_id)))
    }
}

#[async_trait]
impl ProjectApi for LocalApi {
    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        Ok(self.db.get_projects(None)?)
    }

    async fn create_project(&self, input: &CreateProjectInput) -> ClientResult<Project> {
        if self.db.get_user(input.user_id)?.is_none() {
            return Err(ClientError::NotFound(format!("user {}", input.user_id)));
        }
        let project = self.db.create_project(input.clone())?;
        tracing::info!(project_id = project.id, name = %project.name, "project created");
        self.bus
            .publish(Notification::project_created(project.clone()))
            .await;
        Ok(project)
    }

    async fn list_messages(&self, project_id: i64) -> ClientResult<Vec<Message>> {
        Ok(self.db.get_messages(project_id)?)
    }

    async fn create_message(
        &self,
        project_id: i64,
        input: &CreateMessageInput,
    ) -> ClientResult<Message> {
        self.require_project(project_id)?;
        let message = self.db.create_message(project_id, input.clone())?;
        tracing::debug!(
            project_id,
            message_id = message.id,
            sender = message.sender.as_str(),
            "message created"
        );
        self.bus
            .publish(Notification::message_created(message.clone()))
            .await;
        Ok(message)
    }

    async fn list_logs(&self, project_id: i64) -> ClientResult<Vec<LogEntry>> {
        Ok(self.db.get_logs(project_id)?)
    }

    async fn create_log(&self, project_id: i64, input: &CreateLogInput) -> ClientResult<LogEntry> {
        self.require_project(project_id)?;
        let log = self.db.create_log(project_id, input.clone())?;
        tracing::debug!(project_id, log_id = log.id, log_type = %log.log_type, "log created");
        self.bus.publish(Notification::log_created(log.clone())).await;
        Ok(log)
    }

    async fn get_credentials(&self, project_id: i64) -> ClientResult<CredentialSet> {
        self.require_project(project_id)?;
        Ok(self.db.get_credentials(project_id)?)
    }

    async fn save_credentials(
        &self,
        project_id: i64,
        credentials: &CredentialSet,
    ) -> ClientResult<()> {
        self.require_project(project_id)?;
        self.db.replace_credentials(project_id, credentials)?;
        tracing::info!(project_id, platforms = credentials.len(), "credentials saved");
        Ok(())
    }
}
