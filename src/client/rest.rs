//! HTTP client for a running `pdesk serve`.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_client as es;
use eventsource_client::Client as _;
use futures::StreamExt;
use reqwest::{Client as HttpClient, Method, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::{ClientError, ClientResult, ProjectApi};
use crate::models::{
    CreateLogInput, CreateMessageInput, CreateProjectInput, CredentialSet, LogEntry, Message,
    Notification, Project,
};
use crate::notify::NotificationBus;

/// Background task mirroring the server's SSE stream into a local bus.
///
/// The task stops when this handle is dropped.
pub struct EventFeed {
    handle: JoinHandle<()>,
}

impl EventFeed {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http_client: HttpClient,
    base_url: Url,
}

impl RestClient {
    pub fn new(base_url: Url) -> ClientResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(concat!("projectdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn from_url(base_url: &str) -> ClientResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Start mirroring server notifications into `bus`.
    ///
    /// With `project_id` set the server filters the stream; otherwise every
    /// project's events are forwarded. Reconnects with backoff on failure.
    pub fn forward_events(
        &self,
        bus: NotificationBus,
        project_id: Option<i64>,
    ) -> ClientResult<EventFeed> {
        let mut url = self.url("/api/v1/events")?;
        if let Some(id) = project_id {
            url.query_pairs_mut()
                .append_pair("project_id", &id.to_string());
        }

        let client = es::ClientBuilder::for_url(url.as_str())
            .map_err(|e| ClientError::Stream(e.to_string()))?
            .reconnect(
                es::ReconnectOptions::reconnect(true)
                    .retry_initial(true)
                    .delay(Duration::from_secs(1))
                    .backoff_factor(2)
                    .delay_max(Duration::from_secs(30))
                    .build(),
            )
            .build();

        tracing::info!(url = %url, "subscribing to server notifications");

        let handle = tokio::spawn(async move {
            let mut stream = client.stream();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(es::SSE::Event(event)) => {
                        match serde_json::from_str::<Notification>(&event.data) {
                            Ok(notification) => bus.publish(notification).await,
                            Err(e) => {
                                tracing::warn!(error = %e, event_type = %event.event_type, "unparseable notification")
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = ?e, "notification stream error"),
                }
            }
            tracing::debug!("notification stream ended");
        });

        Ok(EventFeed { handle })
    }

    // Private helper methods

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(Method::GET, path, None::<&()>).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<T> {
        let response = self.send(method, path, body).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<Response> {
        let url = self.url(path)?;
        let mut request = self.http_client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        tracing::debug!(%method, path, status = status.as_u16(), "request failed");

        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ClientError::NotFound(message))
        } else {
            Err(ClientError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ProjectApi for RestClient {
    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        self.get("/api/v1/projects").await
    }

    async fn create_project(&self, input: &CreateProjectInput) -> ClientResult<Project> {
        self.post("/api/v1/projects", input).await
    }

    async fn list_messages(&self, project_id: i64) -> ClientResult<Vec<Message>> {
        self.get(&format!("/api/v1/projects/{}/messages", project_id))
            .await
    }

    async fn create_message(
        &self,
        project_id: i64,
        input: &CreateMessageInput,
    ) -> ClientResult<Message> {
        self.post(&format!("/api/v1/projects/{}/messages", project_id), input)
            .await
    }

    async fn list_logs(&self, project_id: i64) -> ClientResult<Vec<LogEntry>> {
        self.get(&format!("/api/v1/projects/{}/logs", project_id))
            .await
    }

    async fn create_log(&self, project_id: i64, input: &CreateLogInput) -> ClientResult<LogEntry> {
        self.post(&format!("/api/v1/projects/{}/logs", project_id), input)
            .await
    }

    async fn get_credentials(&self, project_id: i64) -> ClientResult<CredentialSet> {
        self.get(&format!("/api/v1/projects/{}/credentials", project_id))
            .await
    }

    async fn save_credentials(
        &self,
        project_id: i64,
        credentials: &CredentialSet,
    ) -> ClientResult<()> {
        self.send(
            Method::PUT,
            &format!("/api/v1/projects/{}/credentials", project_id),
            Some(credentials),
        )
        .await?;
        Ok(())
    }
}
