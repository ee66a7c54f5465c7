use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Draft,
    Published,
    Active,
    Archived,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Published => "published",
            QuizStatus::Active => "active",
            QuizStatus::Archived => "archived",
        }
    }

    /// Learners may only sit published or active quizzes.
    pub fn is_open(&self) -> bool {
        matches!(self, QuizStatus::Published | QuizStatus::Active)
    }
}

impl std::str::FromStr for QuizStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(QuizStatus::Draft),
            "published" => Ok(QuizStatus::Published),
            "active" => Ok(QuizStatus::Active),
            "archived" => Ok(QuizStatus::Archived),
            other => Err(format!("unknown quiz status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: QuizStatus,
    pub duration_minutes: Option<i32>,
    pub pass_score: Option<i32>,
    pub max_attempts: i32,
    pub randomize_questions: bool,
    pub randomize_options: bool,
    pub show_correct_answer_after_submit: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn duration_or(&self, default_minutes: i32) -> i32 {
        self.duration_minutes.filter(|d| *d > 0).unwrap_or(default_minutes)
    }

    pub fn pass_score_or(&self, default_score: i32) -> i32 {
        self.pass_score.filter(|p| *p > 0).unwrap_or(default_score)
    }

    /// Whether `now` falls inside the optional availability window.
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        let started = self.start_at.map_or(true, |start| start <= now);
        let not_ended = self.end_at.map_or(true, |end| end >= now);
        started && not_ended
    }
}
