use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::attempt::AttemptStatus;
use crate::models::question::QuestionType;
use crate::models::quiz::QuizStatus;
use crate::models::user_answer::ReviewStatus;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    #[validate(length(max = 20000))]
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(nested)]
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttemptResponse {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub score: i32,
    pub correct_count: usize,
    pub total_questions: usize,
    pub earned_points: i32,
    pub total_points: i32,
    pub pending_manual_review: usize,
    pub pass_score: i32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub id: Uuid,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub answer_id: Uuid,
    pub question_id: Uuid,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub points: i32,
    pub selected_option_id: Option<Uuid>,
    pub answer_text: Option<String>,
    pub is_correct: bool,
    pub awarded_points: i32,
    pub review_status: ReviewStatus,
    pub explanation: Option<String>,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetailResponse {
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub pass_score: i32,
    pub passed: Option<bool>,
    pub answers: Vec<AnswerDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerQuestionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub points: i32,
    pub order: i32,
    pub options: Vec<OptionView>,
}

/// What a learner sees before sitting a quiz. Carries no correctness data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerQuizView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: QuizStatus,
    pub duration_minutes: i32,
    pub pass_score: i32,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub total_points: i32,
    pub questions: Vec<LearnerQuestionView>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptListQuery {
    pub quiz_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl AttemptListQuery {
    pub const MAX_LIMIT: i64 = 50;
    pub const DEFAULT_LIMIT: i64 = 10;

    /// `(page, limit)` with page >= 1 and limit clamped to 1..=50.
    pub fn normalized(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptListItem {
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub quiz_title: Option<String>,
    pub status: AttemptStatus,
    pub score: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}
