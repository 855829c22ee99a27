use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{require_text, ApiError, ApiResult};
use super::AppState;
use crate::models::{CreateTaskInput, GenerationTask, UpdateTaskInput};

pub async fn list_tasks(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<GenerationTask>>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_tasks(project_id)?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateTaskInput>,
) -> ApiResult<(StatusCode, Json<GenerationTask>)> {
    require_text("platform", &input.platform)?;
    require_text("prompt", &input.prompt)?;
    state.require_project(project_id)?;
    let task = state.db().create_task(project_id, input)?;
    tracing::info!(project_id, task_id = task.id, platform = %task.platform, "generation task queued");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTaskInput>,
) -> ApiResult<Json<GenerationTask>> {
    let task = state
        .db()
        .update_task_status(id, input.status)?
        .ok_or_else(|| ApiError::not_found(format!("task {}", id)))?;
    tracing::info!(task_id = id, status = task.status.as_str(), "generation task updated");
    Ok(Json(task))
}
