//! MCP server exposing a project's conversation to an assistant agent.
//!
//! The agent reads the thread, posts as the assistant persona, reports what
//! it is working on and records execution logs. Every write goes through a
//! [`ProjectApi`], so a dashboard observing the project sees it live.

use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ProjectApi};
use crate::models::*;

#[derive(Clone)]
pub struct McpServer {
    api: Arc<dyn ProjectApi>,
    tool_router: ToolRouter<Self>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetConversationRequest {
    #[schemars(description = "The project ID")]
    pub project_id: i64,
    #[schemars(description = "Only return the most recent N messages")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PostMessageRequest {
    #[schemars(description = "The project ID")]
    pub project_id: i64,
    #[schemars(description = "Message text. End with '?' to ask the user a question")]
    pub content: String,
    #[schemars(description = "Optional code to attach as a code block")]
    pub code: Option<String>,
    #[schemars(description = "Language of the attached code")]
    pub language: Option<String>,
    #[schemars(description = "File name of the attached code")]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportTaskStatusRequest {
    #[schemars(description = "The project ID")]
    pub project_id: i64,
    #[schemars(description = "Short description of the current activity")]
    pub content: String,
    #[schemars(description = "Status keyword, e.g. running or done")]
    #[serde(default = "default_task_status")]
    pub status: String,
}

fn default_task_status() -> String {
    "running".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddExecutionLogRequest {
    #[schemars(description = "The project ID")]
    pub project_id: i64,
    #[schemars(description = "One-line summary of the step")]
    pub title: String,
    #[schemars(description = "Longer output or notes")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Conversation {
    pub project: Project,
    pub messages: Vec<Message>,
    pub logs: Vec<LogEntry>,
}

impl McpServer {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self {
            api,
            tool_router: Self::tool_router(),
        }
    }

    fn map_err(e: ClientError) -> McpError {
        match e {
            ClientError::NotFound(what) => McpError::invalid_params(format!("{} not found", what), None),
            other => McpError::internal_error(other.to_string(), None),
        }
    }

    async fn find_project(&self, project_id: i64) -> Result<Project, McpError> {
        let projects = self.api.list_projects().await.map_err(Self::map_err)?;
        projects
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| McpError::invalid_params("Project not found", None))
    }

    fn require_text(field: &str, value: &str) -> Result<(), McpError> {
        if value.trim().is_empty() {
            Err(McpError::invalid_params(format!("{} must not be empty", field), None))
        } else {
            Ok(())
        }
    }
}

#[tool_router]
impl McpServer {
    #[tool(description = "List all projects")]
    async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        let projects = self.api.list_projects().await.map_err(Self::map_err)?;
        let json = serde_json::to_string_pretty(&projects)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get a project's conversation and execution logs, oldest first")]
    async fn get_conversation(
        &self,
        params: Parameters<GetConversationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let project = self.find_project(req.project_id).await?;

        let mut messages = self
            .api
            .list_messages(req.project_id)
            .await
            .map_err(Self::map_err)?;
        if let Some(limit) = req.limit {
            let skip = messages.len().saturating_sub(limit);
            messages.drain(..skip);
        }
        let logs = self
            .api
            .list_logs(req.project_id)
            .await
            .map_err(Self::map_err)?;

        let conversation = Conversation {
            project,
            messages,
            logs,
        };
        let json = serde_json::to_string_pretty(&conversation)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Post a message to the project as the assistant")]
    async fn post_message(
        &self,
        params: Parameters<PostMessageRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        Self::require_text("content", &req.content)?;

        let metadata = req.code.map(|code| MessageMetadata::CodeBlock {
            language: req.language.unwrap_or_else(|| "text".to_string()),
            filename: req.filename,
            code,
        });
        let message = self
            .api
            .create_message(req.project_id, &CreateMessageInput::assistant(req.content, metadata))
            .await
            .map_err(Self::map_err)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Message posted with id: {}",
            message.id
        ))]))
    }

    #[tool(description = "Report what the assistant is currently working on")]
    async fn report_task_status(
        &self,
        params: Parameters<ReportTaskStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        Self::require_text("content", &req.content)?;

        let input = CreateMessageInput::assistant(
            req.content,
            Some(MessageMetadata::TaskStatus { status: req.status }),
        );
        let message = self
            .api
            .create_message(req.project_id, &input)
            .await
            .map_err(Self::map_err)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Status reported with id: {}",
            message.id
        ))]))
    }

    #[tool(description = "Record an execution log entry for the project")]
    async fn add_execution_log(
        &self,
        params: Parameters<AddExecutionLogRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        Self::require_text("title", &req.title)?;

        let log = self
            .api
            .create_log(req.project_id, &CreateLogInput::execution(req.title, req.details))
            .await
            .map_err(Self::map_err)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Log added with id: {}",
            log.id
        ))]))
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "ProjectDesk MCP server: read a project's conversation and reply as its assistant"
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(api: Arc<dyn ProjectApi>) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(api);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalApi;
    use crate::db::Database;
    use crate::notify::NotificationBus;

    fn setup() -> (McpServer, LocalApi, i64) {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let user = db
            .create_user(CreateUserInput {
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
            })
            .unwrap();
        let project = db
            .create_project(CreateProjectInput {
                name: "Launch".into(),
                prompt: String::new(),
                user_id: user.id,
            })
            .unwrap();
        let api = LocalApi::new(db, NotificationBus::new());
        (McpServer::new(Arc::new(api.clone())), api, project.id)
    }

    #[tokio::test]
    async fn test_report_task_status_posts_tagged_message() {
        let (server, api, project_id) = setup();

        server
            .report_task_status(Parameters(ReportTaskStatusRequest {
                project_id,
                content: "Writing landing page copy".into(),
                status: default_task_status(),
            }))
            .await
            .unwrap();

        let messages = api.list_messages(project_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert!(messages[0]
            .metadata
            .as_ref()
            .is_some_and(MessageMetadata::is_task_status));
    }

    #[tokio::test]
    async fn test_post_message_with_code_block() {
        let (server, api, project_id) = setup();

        server
            .post_message(Parameters(PostMessageRequest {
                project_id,
                content: "Here is the config".into(),
                code: Some("port = 3000".into()),
                language: Some("toml".into()),
                filename: Some("app.toml".into()),
            }))
            .await
            .unwrap();

        let messages = api.list_messages(project_id).await.unwrap();
        assert_eq!(messages[0].metadata.as_ref().map(|m| m.tag()), Some("code_block"));
    }

    #[tokio::test]
    async fn test_unknown_project_is_invalid_params() {
        let (server, _, _) = setup();

        let result = server
            .add_execution_log(Parameters(AddExecutionLogRequest {
                project_id: 999,
                title: "deploy".into(),
                details: None,
            }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_conversation_limit_keeps_latest() {
        let (server, api, project_id) = setup();
        for text in ["one", "two", "three"] {
            api.create_message(project_id, &CreateMessageInput::user(text))
                .await
                .unwrap();
        }

        let result = server
            .get_conversation(Parameters(GetConversationRequest {
                project_id,
                limit: Some(2),
            }))
            .await;
        assert!(result.is_ok());
    }
}
