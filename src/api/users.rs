use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::error::{require_text, ApiResult};
use super::AppState;
use crate::models::{CreateUserInput, User};

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.db().get_users()?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_text("email", &input.email)?;
    require_text("display_name", &input.display_name)?;
    let user = state.db().create_user(input)?;
    Ok((StatusCode::CREATED, Json(user)))
}
