use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{AnswerOption, Question, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOptionPayload {
    #[validate(length(max = 1000))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000, message = "text is required"))]
    pub text: String,
    pub explanation: Option<String>,
    #[validate(range(min = 1, max = 100, message = "points must be between 1 and 100"))]
    pub points: i32,
    pub order: Option<i32>,
    pub answer_key_text: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub options: Vec<CreateOptionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminOptionView {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

impl From<AnswerOption> for AdminOptionView {
    fn from(option: AnswerOption) -> Self {
        Self {
            id: option.id,
            text: option.text,
            is_correct: option.is_correct,
        }
    }
}

/// Reviewer view of a question, correctness included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub quiz_id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub explanation: Option<String>,
    pub points: i32,
    pub order: i32,
    pub answer_key_text: Option<String>,
    pub manual_grading_required: bool,
    pub created_at: DateTime<Utc>,
    pub options: Vec<AdminOptionView>,
}

impl QuestionResponse {
    pub fn from_parts(question: Question, options: Vec<AnswerOption>) -> Self {
        Self {
            id: question.id,
            quiz_id: question.quiz_id,
            question_type: question.question_type,
            text: question.text,
            explanation: question.explanation,
            points: question.points,
            order: question.order,
            answer_key_text: question.answer_key_text,
            manual_grading_required: question.manual_grading_required,
            created_at: question.created_at,
            options: options.into_iter().map(AdminOptionView::from).collect(),
        }
    }
}
