use std::collections::HashMap;

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::question::Question;
use crate::models::user_answer::{ReviewStatus, UserAnswer};
use crate::store::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub earned_points: i32,
    pub total_points: i32,
    pub score: i32,
    pub pending_count: usize,
    pub manually_graded: bool,
}

/// `round(100 * earned / total)` with halves rounded up, 0 when `total` is 0.
pub fn percentage(earned_points: i32, total_points: i32) -> i32 {
    if total_points <= 0 {
        return 0;
    }
    let earned = i64::from(earned_points.max(0));
    let total = i64::from(total_points);
    let rounded = (200 * earned + total) / (2 * total);
    rounded.clamp(0, 100) as i32
}

/// Sums every answered question's points into the denominator, pending
/// essays included. Answers whose question no longer exists are skipped.
pub fn summarize(answers: &[UserAnswer], questions: &HashMap<Uuid, Question>) -> ScoreSummary {
    let mut earned_points = 0;
    let mut total_points = 0;
    let mut pending_count = 0;
    let mut manually_graded = false;

    for answer in answers {
        let Some(question) = questions.get(&answer.question_id) else {
            continue;
        };
        total_points += question.points;
        earned_points += answer.awarded_points.clamp(0, question.points);

        match answer.review_status {
            ReviewStatus::Pending => pending_count += 1,
            ReviewStatus::ManualGraded => manually_graded = true,
            ReviewStatus::AutoGraded => {}
        }
    }

    ScoreSummary {
        earned_points,
        total_points,
        score: percentage(earned_points, total_points),
        pending_count,
        manually_graded,
    }
}

/// Recomputes an attempt's score from its full current answer set.
#[derive(Clone)]
pub struct ScoreService {
    stores: Stores,
}

impl ScoreService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Reads every answer of the attempt and writes the resulting score.
    /// Callers serialize concurrent recomputes of one attempt.
    #[instrument(skip(self))]
    pub async fn recompute(&self, attempt_id: Uuid) -> Result<ScoreSummary> {
        let answers = self.stores.answers.find_by_attempt(attempt_id).await?;
        let question_ids: Vec<Uuid> = answers.iter().map(|a| a.question_id).collect();
        let questions: HashMap<Uuid, Question> = self
            .stores
            .questions
            .find_by_ids(&question_ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        let summary = summarize(&answers, &questions);
        self.stores.attempts.update_score(attempt_id, summary.score).await?;

        tracing::debug!(
            %attempt_id,
            earned = summary.earned_points,
            total = summary.total_points,
            score = summary.score,
            "attempt score recomputed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionType;
    use chrono::Utc;

    fn question(points: i32) -> Question {
        Question {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            question_type: QuestionType::MultipleChoice,
            text: "Q".into(),
            explanation: None,
            points,
            order: 0,
            answer_key_text: None,
            manual_grading_required: false,
            created_at: Utc::now(),
        }
    }

    fn answer(question: &Question, awarded: i32, status: ReviewStatus) -> UserAnswer {
        UserAnswer {
            id: Uuid::new_v4(),
            attempt_id: Uuid::new_v4(),
            question_id: question.id,
            selected_option_id: None,
            answer_text: None,
            is_correct: awarded > 0,
            awarded_points: awarded,
            review_status: status,
            graded_by: None,
            graded_at: None,
        }
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(25, 40), 63);
        assert_eq!(percentage(10, 40), 25);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
    }

    #[test]
    fn percentage_is_bounded() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(40, 40), 100);
        assert_eq!(percentage(80, 40), 100);
        assert_eq!(percentage(-3, 40), 0);
    }

    #[test]
    fn pending_essays_count_against_the_denominator() {
        let (mc1, mc2, essay) = (question(10), question(10), question(20));
        let questions: HashMap<Uuid, Question> = [&mc1, &mc2, &essay]
            .into_iter()
            .map(|q| (q.id, q.clone()))
            .collect();
        let answers = vec![
            answer(&mc1, 10, ReviewStatus::AutoGraded),
            answer(&mc2, 0, ReviewStatus::AutoGraded),
            answer(&essay, 0, ReviewStatus::Pending),
        ];

        let summary = summarize(&answers, &questions);
        assert_eq!(summary.earned_points, 10);
        assert_eq!(summary.total_points, 40);
        assert_eq!(summary.score, 25);
        assert_eq!(summary.pending_count, 1);
        assert!(!summary.manually_graded);
    }

    #[test]
    fn summarize_is_idempotent_and_skips_orphans() {
        let q = question(10);
        let questions = HashMap::from([(q.id, q.clone())]);
        let orphan = answer(&question(50), 50, ReviewStatus::AutoGraded);
        let answers = vec![answer(&q, 10, ReviewStatus::ManualGraded), orphan];

        let first = summarize(&answers, &questions);
        let second = summarize(&answers, &questions);
        assert_eq!(first, second);
        assert_eq!(first.total_points, 10);
        assert_eq!(first.score, 100);
        assert!(first.manually_graded);
    }

    #[test]
    fn empty_attempt_scores_zero() {
        let summary = summarize(&[], &HashMap::new());
        assert_eq!(summary.score, 0);
        assert_eq!(summary.total_points, 0);
    }
}
