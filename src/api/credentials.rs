//! Credential storage endpoints.
//!
//! Values are stored and returned as-is; masking is a display concern of
//! [`CredentialEditor`](crate::credentials::CredentialEditor). Nothing here
//! logs values.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::models::CredentialSet;

pub async fn get_credentials(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<CredentialSet>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_credentials(project_id)?))
}

pub async fn replace_credentials(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(set): Json<CredentialSet>,
) -> ApiResult<StatusCode> {
    if set.keys().any(|platform| platform.trim().is_empty()) {
        return Err(ApiError::bad_request("platform must not be empty"));
    }
    state.require_project(project_id)?;
    state.db().replace_credentials(project_id, &set)?;
    tracing::info!(project_id, platforms = set.len(), "credentials saved");
    Ok(StatusCode::NO_CONTENT)
}
