use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
        }
    }

    /// Both `Submitted` and `Graded` are final for the learner.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }

    /// `Graded` is an annotation on a submitted attempt; it never applies
    /// before submission.
    pub fn derive(submitted: bool, manually_graded: bool) -> Self {
        match (submitted, manually_graded) {
            (false, _) => AttemptStatus::InProgress,
            (true, false) => AttemptStatus::Submitted,
            (true, true) => AttemptStatus::Graded,
        }
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "graded" => Ok(AttemptStatus::Graded),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub status: AttemptStatus,
}

impl QuizAttempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn deadline(&self, duration_minutes: i32) -> DateTime<Utc> {
        self.started_at + Duration::minutes(duration_minutes as i64)
    }

    /// Hard cutoff: exactly at the deadline is still accepted.
    pub fn is_expired_at(&self, now: DateTime<Utc>, duration_minutes: i32) -> bool {
        now > self.deadline(duration_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(started_at: DateTime<Utc>) -> QuizAttempt {
        QuizAttempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            started_at,
            submitted_at: None,
            score: None,
            status: AttemptStatus::InProgress,
        }
    }

    #[test]
    fn status_derivation() {
        assert_eq!(AttemptStatus::derive(false, true), AttemptStatus::InProgress);
        assert_eq!(AttemptStatus::derive(true, false), AttemptStatus::Submitted);
        assert_eq!(AttemptStatus::derive(true, true), AttemptStatus::Graded);
    }

    #[test]
    fn deadline_is_a_hard_cutoff() {
        let now = Utc::now();
        let late = attempt(now - Duration::minutes(40));
        assert!(late.is_expired_at(now, 30));

        let on_time = attempt(now - Duration::minutes(29));
        assert!(!on_time.is_expired_at(now, 30));

        let exact = attempt(now - Duration::minutes(30));
        assert!(!exact.is_expired_at(now, 30));
    }
}
