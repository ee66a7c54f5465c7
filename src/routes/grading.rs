use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::grading_dto::GradeAnswerPayload;
use crate::error::Result;
use crate::models::user::Caller;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Response> {
    let items = state.review_service.list_pending(&caller).await?;
    Ok(Json(json!({ "total": items.len(), "items": items })).into_response())
}

#[axum::debug_handler]
pub async fn grade_answer(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(answer_id): Path<Uuid>,
    Json(payload): Json<GradeAnswerPayload>,
) -> Result<Response> {
    payload.validate()?;
    let graded = state
        .review_service
        .grade_answer(&caller, answer_id, payload)
        .await?;
    Ok(Json(graded).into_response())
}
