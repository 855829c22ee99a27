use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{require_text, ApiResult};
use super::AppState;
use crate::client::ProjectApi;
use crate::models::{CreateMessageInput, Message};

pub async fn list_messages(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Message>>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_messages(project_id)?))
}

pub async fn create_message(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateMessageInput>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    require_text("content", &input.content)?;
    let message = state.api().create_message(project_id, &input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
