use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{require_text, ApiResult};
use super::AppState;
use crate::client::ProjectApi;
use crate::models::{CreateLogInput, LogEntry};

pub async fn list_logs(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_logs(project_id)?))
}

pub async fn create_log(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateLogInput>,
) -> ApiResult<(StatusCode, Json<LogEntry>)> {
    require_text("type", &input.log_type)?;
    require_text("title", &input.title)?;
    let log = state.api().create_log(project_id, &input).await?;
    Ok((StatusCode::CREATED, Json(log)))
}
