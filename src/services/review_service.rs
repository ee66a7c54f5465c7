use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::dto::grading_dto::{GradeAnswerPayload, GradeAnswerResponse, PendingGradingItem};
use crate::error::{Error, Result};
use crate::models::attempt::QuizAttempt;
use crate::models::question::Question;
use crate::models::quiz::Quiz;
use crate::models::user::{Caller, UserSummary};
use crate::models::user_answer::{AnswerPatch, ReviewStatus};
use crate::services::access_service::AccessPolicy;
use crate::services::attempt_locks::AttemptLocks;
use crate::services::score_service::ScoreService;
use crate::store::Stores;
use crate::utils::time::now;

/// Manual grading: the pending queue and per-answer grades.
#[derive(Clone)]
pub struct ReviewService {
    stores: Stores,
    access: Arc<dyn AccessPolicy>,
    scores: ScoreService,
    locks: AttemptLocks,
}

fn by_id<T, F: Fn(&T) -> Uuid>(items: Vec<T>, key: F) -> HashMap<Uuid, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

fn unique(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    ids.collect::<HashSet<_>>().into_iter().collect()
}

impl ReviewService {
    pub fn new(stores: Stores, access: Arc<dyn AccessPolicy>, locks: AttemptLocks) -> Self {
        let scores = ScoreService::new(stores.clone());
        Self {
            stores,
            access,
            scores,
            locks,
        }
    }

    fn require_reviewer(caller: &Caller) -> Result<()> {
        if !caller.role.is_reviewer() {
            tracing::warn!(user_id = %caller.user_id, "non-reviewer tried to grade");
            return Err(Error::Forbidden("Only teachers and admins can grade".to_string()));
        }
        Ok(())
    }

    /// Pending answers the caller may grade, oldest attempt first. Answers
    /// whose question, attempt or quiz has disappeared are left out.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn list_pending(&self, caller: &Caller) -> Result<Vec<PendingGradingItem>> {
        Self::require_reviewer(caller)?;

        let pending = self.stores.answers.find_pending().await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let questions: HashMap<Uuid, Question> = by_id(
            self.stores
                .questions
                .find_by_ids(&unique(pending.iter().map(|a| a.question_id)))
                .await?,
            |q| q.id,
        );
        let attempts: HashMap<Uuid, QuizAttempt> = by_id(
            self.stores
                .attempts
                .find_by_ids(&unique(pending.iter().map(|a| a.attempt_id)))
                .await?,
            |a| a.id,
        );
        let quizzes: HashMap<Uuid, Quiz> = by_id(
            self.stores
                .quizzes
                .find_by_ids(&unique(questions.values().map(|q| q.quiz_id)))
                .await?,
            |q| q.id,
        );
        let users: HashMap<Uuid, UserSummary> = by_id(
            self.stores
                .users
                .find_users(&unique(attempts.values().map(|a| a.user_id)))
                .await?,
            |u| u.id,
        );

        let mut allowed: HashMap<Uuid, bool> = HashMap::new();
        for quiz in quizzes.values() {
            allowed.insert(quiz.id, self.access.can_review_quiz(caller, quiz).await?);
        }

        let mut items: Vec<PendingGradingItem> = pending
            .into_iter()
            .filter_map(|answer| {
                let question = questions.get(&answer.question_id)?;
                let attempt = attempts.get(&answer.attempt_id)?;
                let quiz = quizzes.get(&question.quiz_id)?;
                if !allowed.get(&quiz.id).copied().unwrap_or(false) {
                    return None;
                }
                let user = users.get(&attempt.user_id);
                Some(PendingGradingItem {
                    answer_id: answer.id,
                    attempt_id: attempt.id,
                    quiz_id: quiz.id,
                    quiz_title: quiz.title.clone(),
                    question_id: question.id,
                    question_text: question.text.clone(),
                    max_points: question.points,
                    answer_text: answer.answer_text,
                    user_id: attempt.user_id,
                    user_name: user.map(|u| u.name.clone()),
                    user_email: user.map(|u| u.email.clone()),
                    submitted_at: attempt.submitted_at,
                })
            })
            .collect();
        items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));

        tracing::debug!(count = items.len(), "pending answers listed");
        Ok(items)
    }

    /// Records a grader's verdict and recomputes the owning attempt's score.
    /// Points above the question's maximum are clamped to it.
    #[instrument(skip(self, caller, payload), fields(user_id = %caller.user_id))]
    pub async fn grade_answer(
        &self,
        caller: &Caller,
        answer_id: Uuid,
        payload: GradeAnswerPayload,
    ) -> Result<GradeAnswerResponse> {
        Self::require_reviewer(caller)?;
        if payload.awarded_points < 0 {
            return Err(Error::ValidationFailed(
                "awarded_points must not be negative".to_string(),
            ));
        }

        let answer = self
            .stores
            .answers
            .find_by_id(answer_id)
            .await?
            .ok_or_else(|| Error::NotFound("User answer not found".to_string()))?;

        // answer -> question -> quiz -> module; a broken link denies
        let question = self
            .stores
            .questions
            .find_by_id(answer.question_id)
            .await?
            .ok_or_else(|| Error::Forbidden("Question for this answer no longer exists".to_string()))?;
        let quiz = self
            .stores
            .quizzes
            .find_by_id(question.quiz_id)
            .await?
            .ok_or_else(|| Error::Forbidden("Quiz for this answer no longer exists".to_string()))?;
        if !self.access.can_review_quiz(caller, &quiz).await? {
            tracing::warn!(quiz_id = %quiz.id, "grading denied");
            return Err(Error::Forbidden("You cannot grade answers for this quiz".to_string()));
        }

        let _guard = self.locks.lock(answer.attempt_id).await;

        let awarded_points = payload.awarded_points.min(question.points);
        let patch = AnswerPatch {
            awarded_points,
            is_correct: payload.is_correct,
            review_status: ReviewStatus::ManualGraded,
            graded_by: caller.user_id,
            graded_at: now(),
        };
        let updated = self.stores.answers.update(answer.id, &patch).await?;
        let summary = self.scores.recompute(answer.attempt_id).await?;
        self.stores.attempts.mark_graded(answer.attempt_id).await?;

        let attempt = self
            .stores
            .attempts
            .find_by_id(answer.attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        tracing::info!(
            attempt_id = %attempt.id,
            awarded_points,
            score = summary.score,
            "answer graded"
        );

        Ok(GradeAnswerResponse {
            answer_id: updated.id,
            attempt_id: attempt.id,
            awarded_points: updated.awarded_points,
            is_correct: updated.is_correct,
            review_status: updated.review_status,
            attempt_score: summary.score,
            attempt_status: attempt.status,
            pending_manual_review: summary.pending_count,
        })
    }
}
