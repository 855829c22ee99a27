//! Access to project data, local or remote.
//!
//! [`ProjectApi`] is the seam the sync service and the MCP server are written
//! against. [`LocalApi`] talks to the database and publishes to an in-process
//! [`NotificationBus`](crate::notify::NotificationBus); [`RestClient`] talks to a
//! running `pdesk serve` over HTTP and can mirror its notification stream.

mod error;
mod local;
mod rest;

pub use error::*;
pub use local::LocalApi;
pub use rest::{EventFeed, RestClient};

use async_trait::async_trait;

use crate::models::{
    CreateLogInput, CreateMessageInput, CreateProjectInput, CredentialSet, LogEntry, Message,
    Project,
};

#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn list_projects(&self) -> ClientResult<Vec<Project>>;

    async fn create_project(&self, input: &CreateProjectInput) -> ClientResult<Project>;

    /// Messages of a project, oldest first.
    async fn list_messages(&self, project_id: i64) -> ClientResult<Vec<Message>>;

    async fn create_message(
        &self,
        project_id: i64,
        input: &CreateMessageInput,
    ) -> ClientResult<Message>;

    /// Logs of a project, oldest first.
    async fn list_logs(&self, project_id: i64) -> ClientResult<Vec<LogEntry>>;

    async fn create_log(&self, project_id: i64, input: &CreateLogInput) -> ClientResult<LogEntry>;

    async fn get_credentials(&self, project_id: i64) -> ClientResult<CredentialSet>;

    async fn save_credentials(&self, project_id: i64, credentials: &CredentialSet)
        -> ClientResult<()>;
}
