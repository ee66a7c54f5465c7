use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::question_dto::CreateQuestionPayload;
use crate::error::Result;
use crate::models::user::Caller;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Response> {
    let questions = state.question_service.list(&caller, quiz_id).await?;
    Ok(Json(questions).into_response())
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<Response> {
    let created = state
        .question_service
        .create(&caller, quiz_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(question_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.question_service.delete(&caller, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
