use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    AutoGraded,
    ManualGraded,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::AutoGraded => "auto_graded",
            ReviewStatus::ManualGraded => "manual_graded",
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "auto_graded" => Ok(ReviewStatus::AutoGraded),
            "manual_graded" => Ok(ReviewStatus::ManualGraded),
            other => Err(format!("unknown review status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    pub answer_text: Option<String>,
    pub is_correct: bool,
    pub awarded_points: i32,
    pub review_status: ReviewStatus,
    pub graded_by: Option<Uuid>,
    pub graded_at: Option<DateTime<Utc>>,
}

/// Mutation applied by a manual grader.
#[derive(Debug, Clone)]
pub struct AnswerPatch {
    pub awarded_points: i32,
    pub is_correct: bool,
    pub review_status: ReviewStatus,
    pub graded_by: Uuid,
    pub graded_at: DateTime<Utc>,
}

impl UserAnswer {
    pub fn apply(&mut self, patch: &AnswerPatch) {
        self.awarded_points = patch.awarded_points;
        self.is_correct = patch.is_correct;
        self.review_status = patch.review_status;
        self.graded_by = Some(patch.graded_by);
        self.graded_at = Some(patch.graded_at);
    }
}
