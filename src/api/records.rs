//! Generated outputs and recorded sales.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{require_text, ApiError, ApiResult};
use super::AppState;
use crate::models::{CreateOutputInput, CreateSaleInput, Output, Sale};

pub async fn list_outputs(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Output>>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_outputs(project_id)?))
}

pub async fn create_output(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateOutputInput>,
) -> ApiResult<(StatusCode, Json<Output>)> {
    require_text("kind", &input.kind)?;
    require_text("title", &input.title)?;
    state.require_project(project_id)?;
    let output = state.db().create_output(project_id, input)?;
    Ok((StatusCode::CREATED, Json(output)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Sale>>> {
    state.require_project(project_id)?;
    Ok(Json(state.db().get_sales(project_id)?))
}

pub async fn create_sale(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateSaleInput>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    if input.amount_cents < 0 {
        return Err(ApiError::bad_request("amount_cents must not be negative"));
    }
    if input.currency.trim().len() != 3 {
        return Err(ApiError::bad_request("currency must be a three-letter code"));
    }
    state.require_project(project_id)?;
    let sale = state.db().create_sale(project_id, input)?;
    Ok((StatusCode::CREATED, Json(sale)))
}
