//! Features, milestones and goals.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{require_text, ApiError, ApiResult};
use super::AppState;
use crate::models::{
    CreateFeatureInput, CreateGoalInput, CreateMilestoneInput, Feature, Goal, Milestone,
    UpdateStatusInput,
};

pub async fn list_features(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Feature>>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_features(project_id)?))
}

pub async fn create_feature(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateFeatureInput>,
) -> ApiResult<(StatusCode, Json<Feature>)> {
    require_text("title", &input.title)?;
    state.require_project(project_id)?;
    let feature = state.db().create_feature(project_id, input)?;
    Ok((StatusCode::CREATED, Json(feature)))
}

fn require_feature(state: &AppState, feature_id: i64) -> ApiResult<Feature> {
    state
        .db()
        .get_feature(feature_id)?
        .ok_or_else(|| ApiError::not_found(format!("feature {}", feature_id)))
}

fn require_milestone(state: &AppState, milestone_id: i64) -> ApiResult<Milestone> {
    state
        .db()
        .get_milestone(milestone_id)?
        .ok_or_else(|| ApiError::not_found(format!("milestone {}", milestone_id)))
}

pub async fn list_milestones(
    State(state): State<AppState>,
    Path(feature_id): Path<i64>,
) -> ApiResult<Json<Vec<Milestone>>> {
    require_feature(&state, feature_id)?;
    Ok(Json(state.db().get_milestones(feature_id)?))
}

pub async fn create_milestone(
    State(state): State<AppState>,
    Path(feature_id): Path<i64>,
    Json(input): Json<CreateMilestoneInput>,
) -> ApiResult<(StatusCode, Json<Milestone>)> {
    require_text("title", &input.title)?;
    require_feature(&state, feature_id)?;
    let milestone = state.db().create_milestone(feature_id, input)?;
    Ok((StatusCode::CREATED, Json(milestone)))
}

pub async fn list_goals(
    State(state): State<AppState>,
    Path(milestone_id): Path<i64>,
) -> ApiResult<Json<Vec<Goal>>> {
    require_milestone(&state, milestone_id)?;
    Ok(Json(state.db().get_goals(milestone_id)?))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Path(milestone_id): Path<i64>,
    Json(input): Json<CreateGoalInput>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    require_text("title", &input.title)?;
    require_milestone(&state, milestone_id)?;
    let goal = state.db().create_goal(milestone_id, input)?;
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateStatusInput>,
) -> ApiResult<StatusCode> {
    if state.db().update_goal_status(id, input.status)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("goal {}", id)))
    }
}
