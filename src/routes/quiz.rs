use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{AttemptListQuery, SubmitAttemptRequest};
use crate::error::Result;
use crate::models::user::Caller;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let view = state
        .attempt_service
        .get_quiz_for_learner(&caller, quiz_id)
        .await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let started = state.attempt_service.start_attempt(&caller, quiz_id).await?;
    Ok((StatusCode::CREATED, Json(started)).into_response())
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Response> {
    payload.validate()?;
    let result = state
        .attempt_service
        .submit_attempt(&caller, attempt_id, payload)
        .await?;
    Ok(Json(result).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let detail = state
        .attempt_service
        .get_attempt_detail(&caller, attempt_id)
        .await?;
    Ok(Json(detail).into_response())
}

#[axum::debug_handler]
pub async fn list_my_attempts(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<AttemptListQuery>,
) -> Result<Response> {
    let page = state.attempt_service.list_my_attempts(&caller, &query).await?;
    Ok(Json(page).into_response())
}
