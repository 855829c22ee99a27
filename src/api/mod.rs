//! HTTP API.
//!
//! JSON CRUD under `/api/v1` plus the notification streams (`/api/v1/events`
//! as SSE, `/ws` as WebSocket). Creates of projects, messages and logs go
//! through [`LocalApi`] so they are announced on the bus.

mod credentials;
mod error;
mod events;
mod logs;
mod messages;
mod plans;
mod projects;
mod records;
mod tasks;
mod users;

pub use error::{ApiError, ApiResult};

use std::fmt::Display;
use std::future::Future;

use axum::routing::{get, patch};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::LocalApi;
use crate::db::Database;
use crate::models::Project;
use crate::notify::NotificationBus;

#[derive(Clone)]
pub struct AppState {
    api: LocalApi,
}

impl AppState {
    pub fn new(db: Database, bus: NotificationBus) -> Self {
        Self {
            api: LocalApi::new(db, bus),
        }
    }

    pub fn api(&self) -> &LocalApi {
        &self.api
    }

    pub fn db(&self) -> &Database {
        self.api.db()
    }

    pub fn bus(&self) -> &NotificationBus {
        self.api.bus()
    }

    pub(crate) fn require_project(&self, project_id: i64) -> ApiResult<Project> {
        self.db()
            .get_project(project_id)?
            .ok_or_else(|| ApiError::not_found(format!("project {}", project_id)))
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(projects::get_project).patch(projects::update_project),
        )
        .route(
            "/projects/{id}/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route(
            "/projects/{id}/logs",
            get(logs::list_logs).post(logs::create_log),
        )
        .route(
            "/projects/{id}/features",
            get(plans::list_features).post(plans::create_feature),
        )
        .route(
            "/features/{id}/milestones",
            get(plans::list_milestones).post(plans::create_milestone),
        )
        .route(
            "/milestones/{id}/goals",
            get(plans::list_goals).post(plans::create_goal),
        )
        .route("/goals/{id}", patch(plans::update_goal))
        .route(
            "/projects/{id}/outputs",
            get(records::list_outputs).post(records::create_output),
        )
        .route(
            "/projects/{id}/sales",
            get(records::list_sales).post(records::create_sale),
        )
        .route(
            "/projects/{id}/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route("/tasks/{id}", patch(tasks::update_task))
        .route(
            "/projects/{id}/credentials",
            get(credentials::get_credentials).put(credentials::replace_credentials),
        )
        .route("/events", get(events::stream_events));

    Router::new()
        .nest("/api/v1", api)
        .route("/ws", get(events::websocket))
        .route("/health", get(|| async { "ok" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Resolves on Ctrl-C, for `with_graceful_shutdown`.
pub async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await;
}

/// If the signal handler cannot be installed, never resolves: the server
/// keeps running instead of stopping at once.
async fn wait_for_shutdown<F, E>(signal: F)
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match signal.await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
