use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::attempt::AttemptStatus;
use crate::models::user_answer::ReviewStatus;

/// One queue entry shown to a grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingGradingItem {
    pub answer_id: Uuid,
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub question_id: Uuid,
    pub question_text: String,
    pub max_points: i32,
    pub answer_text: Option<String>,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GradeAnswerPayload {
    #[validate(range(min = 0, message = "awarded_points must not be negative"))]
    pub awarded_points: i32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeAnswerResponse {
    pub answer_id: Uuid,
    pub attempt_id: Uuid,
    pub awarded_points: i32,
    pub is_correct: bool,
    pub review_status: ReviewStatus,
    pub attempt_score: i32,
    pub attempt_status: AttemptStatus,
    pub pending_manual_review: usize,
}
