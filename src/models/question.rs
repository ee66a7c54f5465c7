use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Essay,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Essay => "essay",
        }
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "essay" => Ok(QuestionType::Essay),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
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
}

impl Question {
    /// The trimmed essay key, if one is set.
    pub fn answer_key(&self) -> Option<&str> {
        self.answer_key_text
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// True iff the question is an essay without an answer key.
    pub fn requires_manual_grading(question_type: QuestionType, answer_key: Option<&str>) -> bool {
        question_type == QuestionType::Essay
            && answer_key.map_or(true, |k| k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_grading_only_for_keyless_essays() {
        assert!(Question::requires_manual_grading(QuestionType::Essay, None));
        assert!(Question::requires_manual_grading(QuestionType::Essay, Some("   ")));
        assert!(!Question::requires_manual_grading(QuestionType::Essay, Some("Jakarta")));
        assert!(!Question::requires_manual_grading(QuestionType::MultipleChoice, None));
    }
}
