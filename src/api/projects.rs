use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::error::{require_text, ApiError, ApiResult};
use super::AppState;
use crate::client::ProjectApi;
use crate::models::{CreateProjectInput, Project, UpdateProjectInput};

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub user_id: Option<i64>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.db().get_projects(query.user_id)?))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<CreateProjectInput>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    require_text("name", &input.name)?;
    let project = state.api().create_project(&input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.require_project(id)?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateProjectInput>,
) -> ApiResult<Json<Project>> {
    if let Some(name) = &input.name {
        require_text("name", name)?;
    }
    let project = state
        .db()
        .update_project(id, input)?
        .ok_or_else(|| ApiError::not_found(format!("project {}", id)))?;
    tracing::info!(project_id = id, active = project.active, "project updated");
    Ok(Json(project))
}
