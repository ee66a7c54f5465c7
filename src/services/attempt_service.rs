use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::dto::attempt_dto::{
    AnswerDetail, AttemptDetailResponse, AttemptListItem, AttemptListQuery, LearnerQuestionView,
    LearnerQuizView, OptionView, Paginated, StartAttemptResponse, SubmitAttemptRequest,
    SubmitAttemptResponse,
};
use crate::error::{Error, Result};
use crate::models::attempt::QuizAttempt;
use crate::models::question::{AnswerOption, Question};
use crate::models::quiz::Quiz;
use crate::models::user::{Caller, Role};
use crate::services::access_service::AccessPolicy;
use crate::services::attempt_locks::AttemptLocks;
use crate::services::grading_service::GradingService;
use crate::services::score_service::summarize;
use crate::store::Stores;
use crate::utils::time::now;

/// Fallbacks for quizzes stored without a duration or pass score.
#[derive(Debug, Clone, Copy)]
pub struct QuizDefaults {
    pub duration_minutes: i32,
    pub pass_score: i32,
}

impl From<&Config> for QuizDefaults {
    fn from(config: &Config) -> Self {
        Self {
            duration_minutes: config.default_duration_minutes,
            pass_score: config.default_pass_score,
        }
    }
}

/// The learner side of the attempt lifecycle: start, submit, review results.
#[derive(Clone)]
pub struct AttemptService {
    stores: Stores,
    access: Arc<dyn AccessPolicy>,
    locks: AttemptLocks,
    defaults: QuizDefaults,
}

impl AttemptService {
    pub fn new(
        stores: Stores,
        access: Arc<dyn AccessPolicy>,
        locks: AttemptLocks,
        defaults: QuizDefaults,
    ) -> Self {
        Self {
            stores,
            access,
            locks,
            defaults,
        }
    }

    async fn load_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        self.stores
            .quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))
    }

    /// Loads an attempt the caller owns. Someone else's attempt is reported
    /// as missing.
    async fn load_own_attempt(&self, caller: &Caller, attempt_id: Uuid) -> Result<QuizAttempt> {
        match self.stores.attempts.find_by_id(attempt_id).await? {
            Some(attempt) if attempt.user_id == caller.user_id => Ok(attempt),
            _ => Err(Error::NotFound("Attempt not found".to_string())),
        }
    }

    fn require_learner(caller: &Caller, action: &str) -> Result<()> {
        if caller.role != Role::Learner {
            tracing::warn!(user_id = %caller.user_id, role = ?caller.role, action, "role may not take quizzes");
            return Err(Error::Forbidden(format!("Only learners can {}", action)));
        }
        Ok(())
    }

    pub async fn get_quiz_for_learner(&self, caller: &Caller, quiz_id: Uuid) -> Result<LearnerQuizView> {
        let quiz = self.load_quiz(quiz_id).await?;

        let allowed = if caller.role.is_reviewer() {
            self.access.can_review_quiz(caller, &quiz).await?
        } else {
            if !quiz.status.is_open() {
                return Err(Error::NotFound("Quiz not found".to_string()));
            }
            self.access.can_take_quiz(caller, &quiz).await?
        };
        if !allowed {
            return Err(Error::Forbidden("You do not have access to this quiz".to_string()));
        }

        let questions = self.stores.questions.find_by_quiz(quiz.id).await?;
        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let mut options = group_options(self.stores.questions.find_options(&ids).await?);

        let total_points = questions.iter().map(|q| q.points).sum();
        let questions = questions
            .into_iter()
            .map(|q| LearnerQuestionView {
                options: options
                    .remove(&q.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| OptionView {
                        id: o.id,
                        text: o.text,
                        is_correct: None,
                    })
                    .collect(),
                id: q.id,
                question_type: q.question_type,
                text: q.text,
                points: q.points,
                order: q.order,
            })
            .collect();

        Ok(LearnerQuizView {
            id: quiz.id,
            duration_minutes: quiz.duration_or(self.defaults.duration_minutes),
            pass_score: quiz.pass_score_or(self.defaults.pass_score),
            title: quiz.title,
            description: quiz.description,
            status: quiz.status,
            start_at: quiz.start_at,
            end_at: quiz.end_at,
            total_points,
            questions,
        })
    }

    pub async fn start_attempt(&self, caller: &Caller, quiz_id: Uuid) -> Result<StartAttemptResponse> {
        self.start_attempt_at(caller, quiz_id, now()).await
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn start_attempt_at(
        &self,
        caller: &Caller,
        quiz_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<StartAttemptResponse> {
        let quiz = self.load_quiz(quiz_id).await?;

        if !quiz.status.is_open() {
            return Err(Error::Forbidden(format!(
                "Quiz is {} and cannot be started",
                quiz.status.as_str()
            )));
        }
        if !quiz.window_contains(at) {
            return Err(Error::Forbidden(
                "Quiz is outside its availability window".to_string(),
            ));
        }
        Self::require_learner(caller, "start quizzes")?;
        if !self.access.can_take_quiz(caller, &quiz).await? {
            tracing::warn!(%quiz_id, "quiz access denied");
            return Err(Error::Forbidden("You do not have access to this quiz".to_string()));
        }

        let attempt = self.stores.attempts.create(caller.user_id, quiz.id, at).await?;
        let duration_minutes = quiz.duration_or(self.defaults.duration_minutes);
        tracing::info!(attempt_id = %attempt.id, %quiz_id, "attempt started");

        Ok(StartAttemptResponse {
            attempt_id: attempt.id,
            quiz_id: quiz.id,
            status: attempt.status,
            started_at: attempt.started_at,
            expires_at: attempt.deadline(duration_minutes),
            duration_minutes,
        })
    }

    pub async fn submit_attempt(
        &self,
        caller: &Caller,
        attempt_id: Uuid,
        request: SubmitAttemptRequest,
    ) -> Result<SubmitAttemptResponse> {
        self.submit_attempt_at(caller, attempt_id, request, now()).await
    }

    /// Grades the whole answer set and stores it with the score and the
    /// submission mark in one step. A late or failed submission leaves the
    /// attempt in progress with no answers.
    #[instrument(skip(self, caller, request), fields(user_id = %caller.user_id, answers = request.answers.len()))]
    pub async fn submit_attempt_at(
        &self,
        caller: &Caller,
        attempt_id: Uuid,
        request: SubmitAttemptRequest,
        at: DateTime<Utc>,
    ) -> Result<SubmitAttemptResponse> {
        Self::require_learner(caller, "submit quizzes")?;
        let _guard = self.locks.lock(attempt_id).await;

        let attempt = self.load_own_attempt(caller, attempt_id).await?;
        if attempt.is_submitted() {
            tracing::warn!("attempt already submitted");
            return Err(Error::Conflict("Attempt already submitted".to_string()));
        }

        let quiz = self.load_quiz(attempt.quiz_id).await?;
        if !self.access.can_take_quiz(caller, &quiz).await? {
            tracing::warn!(quiz_id = %quiz.id, "quiz access denied");
            return Err(Error::Forbidden("You do not have access to this quiz".to_string()));
        }

        let duration_minutes = quiz.duration_or(self.defaults.duration_minutes);
        if attempt.is_expired_at(at, duration_minutes) {
            tracing::warn!(deadline = %attempt.deadline(duration_minutes), "submission after deadline");
            return Err(Error::DeadlineExceeded("Time for this quiz is up".to_string()));
        }

        let requested: Vec<Uuid> = request
            .answers
            .iter()
            .map(|a| a.question_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let questions: HashMap<Uuid, Question> = self
            .stores
            .questions
            .find_by_ids(&requested)
            .await?
            .into_iter()
            .filter(|q| q.quiz_id == attempt.quiz_id)
            .map(|q| (q.id, q))
            .collect();
        let known: Vec<Uuid> = questions.keys().copied().collect();
        let correct_options = self.stores.questions.find_correct_option_map(&known).await?;

        let batch = GradingService::grade_batch(attempt.id, &questions, &correct_options, &request.answers);
        if batch.dropped > 0 {
            tracing::debug!(dropped = batch.dropped, "ignored answers for unknown questions");
        }

        // an in-progress attempt has no stored answers, so the batch is the full set
        let summary = summarize(&batch.answers, &questions);
        let submitted = self
            .stores
            .attempts
            .submit(attempt.id, at, &batch.answers, summary.score)
            .await?;

        let pass_score = quiz.pass_score_or(self.defaults.pass_score);
        tracing::info!(
            score = summary.score,
            pending = batch.pending_count,
            "attempt submitted"
        );

        Ok(SubmitAttemptResponse {
            attempt_id: submitted.id,
            status: submitted.status,
            score: summary.score,
            correct_count: batch.correct_count,
            total_questions: batch.answers.len(),
            earned_points: summary.earned_points,
            total_points: summary.total_points,
            pending_manual_review: batch.pending_count,
            pass_score,
            passed: summary.score >= pass_score,
            submitted_at: at,
        })
    }

    /// Answers with their grading. Correct options are revealed to the
    /// owner only after submission and only when the quiz allows it;
    /// reviewers of the quiz always see them.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn get_attempt_detail(&self, caller: &Caller, attempt_id: Uuid) -> Result<AttemptDetailResponse> {
        let (attempt, quiz, reveal) = if caller.role.is_reviewer() {
            let attempt = self
                .stores
                .attempts
                .find_by_id(attempt_id)
                .await?
                .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;
            let quiz = self.load_quiz(attempt.quiz_id).await?;
            if !self.access.can_review_quiz(caller, &quiz).await? {
                return Err(Error::Forbidden("You cannot review this quiz".to_string()));
            }
            (attempt, quiz, true)
        } else {
            let attempt = self.load_own_attempt(caller, attempt_id).await?;
            let quiz = self.load_quiz(attempt.quiz_id).await?;
            let reveal = attempt.is_submitted() && quiz.show_correct_answer_after_submit;
            (attempt, quiz, reveal)
        };

        let answers = self.stores.answers.find_by_attempt(attempt.id).await?;
        let question_ids: Vec<Uuid> = answers.iter().map(|a| a.question_id).collect();
        let questions: HashMap<Uuid, Question> = self
            .stores
            .questions
            .find_by_ids(&question_ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        let mut options = group_options(self.stores.questions.find_options(&question_ids).await?);

        let mut details: Vec<AnswerDetail> = answers
            .into_iter()
            .filter_map(|answer| {
                let question = questions.get(&answer.question_id)?;
                let options = options
                    .remove(&question.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| OptionView {
                        id: o.id,
                        text: o.text,
                        is_correct: reveal.then_some(o.is_correct),
                    })
                    .collect();
                Some(AnswerDetail {
                    answer_id: answer.id,
                    question_id: question.id,
                    question_text: question.text.clone(),
                    question_type: question.question_type,
                    points: question.points,
                    selected_option_id: answer.selected_option_id,
                    answer_text: answer.answer_text,
                    is_correct: answer.is_correct,
                    awarded_points: answer.awarded_points,
                    review_status: answer.review_status,
                    explanation: if reveal { question.explanation.clone() } else { None },
                    options,
                })
            })
            .collect();
        details.sort_by_key(|d| questions.get(&d.question_id).map(|q| q.order).unwrap_or(i32::MAX));

        let pass_score = quiz.pass_score_or(self.defaults.pass_score);
        Ok(AttemptDetailResponse {
            attempt_id: attempt.id,
            quiz_id: quiz.id,
            quiz_title: quiz.title,
            status: attempt.status,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            score: attempt.score,
            pass_score,
            passed: attempt
                .submitted_at
                .and(attempt.score)
                .map(|score| score >= pass_score),
            answers: details,
        })
    }

    pub async fn list_my_attempts(
        &self,
        caller: &Caller,
        query: &AttemptListQuery,
    ) -> Result<Paginated<AttemptListItem>> {
        let (page, limit) = query.normalized();
        let (attempts, total) = self
            .stores
            .attempts
            .list_submitted_by_user(caller.user_id, query.quiz_id, (page - 1) * limit, limit)
            .await?;

        let quiz_ids: Vec<Uuid> = attempts
            .iter()
            .map(|a| a.quiz_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let titles: HashMap<Uuid, String> = self
            .stores
            .quizzes
            .find_by_ids(&quiz_ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q.title))
            .collect();

        let items = attempts
            .into_iter()
            .map(|a| AttemptListItem {
                attempt_id: a.id,
                quiz_id: a.quiz_id,
                quiz_title: titles.get(&a.quiz_id).cloned(),
                status: a.status,
                score: a.score,
                started_at: a.started_at,
                submitted_at: a.submitted_at,
            })
            .collect();

        Ok(Paginated::new(items, total, page, limit))
    }
}

pub(crate) fn group_options(options: Vec<AnswerOption>) -> HashMap<Uuid, Vec<AnswerOption>> {
    let mut grouped: HashMap<Uuid, Vec<AnswerOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id).or_default().push(option);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::AttemptStatus;
    use crate::dto::attempt_dto::SubmittedAnswer;
    use crate::models::module::{Module, Visibility};
    use crate::models::question::QuestionType;
    use crate::models::quiz::QuizStatus;
    use crate::services::access_service::{MockAccessPolicy, ModuleAccess};
    use crate::models::user_answer::UserAnswer;
    use crate::store::{AnswerStore, AttemptStore, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        store: MemoryStore,
        service: AttemptService,
        quiz: Quiz,
        question: Question,
        correct: Uuid,
        learner: Caller,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let stores = Stores::in_memory(store.clone());
        let module = Module {
            id: Uuid::new_v4(),
            title: "Geography".into(),
            is_active: true,
            visibility: Visibility::Public,
            assigned_teacher_id: None,
        };
        store.insert_module(module.clone()).await;

        let quiz = Quiz {
            id: Uuid::new_v4(),
            module_id: module.id,
            title: "Capitals".into(),
            description: None,
            status: QuizStatus::Published,
            duration_minutes: Some(30),
            pass_score: Some(70),
            max_attempts: 1,
            randomize_questions: false,
            randomize_options: false,
            show_correct_answer_after_submit: false,
            start_at: None,
            end_at: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        store.insert_quiz(quiz.clone()).await;

        let question = Question {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            question_type: QuestionType::MultipleChoice,
            text: "Capital of France?".into(),
            explanation: Some("Paris is the capital.".into()),
            points: 10,
            order: 1,
            answer_key_text: None,
            manual_grading_required: false,
            created_at: Utc::now(),
        };
        let correct = Uuid::new_v4();
        let options = vec![
            AnswerOption {
                id: Uuid::new_v4(),
                question_id: question.id,
                text: "Lyon".into(),
                is_correct: false,
            },
            AnswerOption {
                id: correct,
                question_id: question.id,
                text: "Paris".into(),
                is_correct: true,
            },
        ];
        stores.questions.create(question.clone(), options).await.unwrap();

        let access = Arc::new(ModuleAccess::new(stores.modules.clone()));
        let service = AttemptService::new(
            stores,
            access,
            AttemptLocks::new(),
            QuizDefaults {
                duration_minutes: 30,
                pass_score: 70,
            },
        );

        Fixture {
            store,
            service,
            quiz,
            question,
            correct,
            learner: Caller::new(Uuid::new_v4(), Role::Learner),
        }
    }

    fn answers(question_id: Uuid, option: Uuid) -> SubmitAttemptRequest {
        SubmitAttemptRequest {
            answers: vec![SubmittedAnswer {
                question_id,
                selected_option_id: Some(option),
                answer_text: None,
            }],
        }
    }

    #[tokio::test]
    async fn submit_scores_and_closes_the_attempt() {
        let f = fixture().await;
        let started = f.service.start_attempt(&f.learner, f.quiz.id).await.unwrap();

        let result = f
            .service
            .submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, f.correct))
            .await
            .unwrap();

        assert_eq!(result.score, 100);
        assert_eq!(result.correct_count, 1);
        assert!(result.passed);
        assert_eq!(result.status, AttemptStatus::Submitted);
        assert!(result.status.is_terminal());
    }

    #[tokio::test]
    async fn late_submission_leaves_attempt_in_progress() {
        let f = fixture().await;
        let started = f
            .service
            .start_attempt_at(&f.learner, f.quiz.id, Utc::now() - Duration::minutes(40))
            .await
            .unwrap();

        let err = f
            .service
            .submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, f.correct))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded(_)));

        let attempt = AttemptStore::find_by_id(&f.store, started.attempt_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert!(attempt.score.is_none());
    }

    #[tokio::test]
    async fn someone_elses_attempt_is_not_found() {
        let f = fixture().await;
        let started = f.service.start_attempt(&f.learner, f.quiz.id).await.unwrap();
        let other = Caller::new(Uuid::new_v4(), Role::Learner);

        let err = f
            .service
            .submit_attempt(&other, started.attempt_id, answers(f.question.id, f.correct))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn draft_quiz_cannot_be_started() {
        let f = fixture().await;
        let mut draft = f.quiz.clone();
        draft.id = Uuid::new_v4();
        draft.status = QuizStatus::Draft;
        f.store.insert_quiz(draft.clone()).await;

        let err = f.service.start_attempt(&f.learner, draft.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn denied_policy_blocks_start() {
        let f = fixture().await;
        let mut policy = MockAccessPolicy::new();
        policy.expect_can_take_quiz().returning(|_, _| Ok(false));
        let service = AttemptService::new(
            Stores::in_memory(f.store.clone()),
            Arc::new(policy),
            AttemptLocks::new(),
            QuizDefaults {
                duration_minutes: 30,
                pass_score: 70,
            },
        );

        let err = service.start_attempt(&f.learner, f.quiz.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn detail_hides_correct_options_unless_quiz_reveals_them() {
        let f = fixture().await;
        let started = f.service.start_attempt(&f.learner, f.quiz.id).await.unwrap();
        f.service
            .submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, f.correct))
            .await
            .unwrap();

        let hidden = f.service.get_attempt_detail(&f.learner, started.attempt_id).await.unwrap();
        assert!(hidden.answers[0].options.iter().all(|o| o.is_correct.is_none()));
        assert!(hidden.answers[0].explanation.is_none());

        let mut revealing = f.quiz.clone();
        revealing.show_correct_answer_after_submit = true;
        f.store.insert_quiz(revealing).await;

        let shown = f.service.get_attempt_detail(&f.learner, started.attempt_id).await.unwrap();
        let flags: Vec<_> = shown.answers[0].options.iter().map(|o| o.is_correct).collect();
        assert!(flags.contains(&Some(true)));
        assert_eq!(shown.passed, Some(true));
    }

    #[tokio::test]
    async fn learner_view_never_carries_correctness() {
        let f = fixture().await;
        let view = f.service.get_quiz_for_learner(&f.learner, f.quiz.id).await.unwrap();
        assert_eq!(view.questions.len(), 1);
        assert_eq!(view.total_points, 10);
        assert!(view.questions[0].options.iter().all(|o| o.is_correct.is_none()));
    }

    fn defaults() -> QuizDefaults {
        QuizDefaults {
            duration_minutes: 30,
            pass_score: 70,
        }
    }

    /// Delegates to a `MemoryStore` but fails the first `submit`.
    struct FailingOnce {
        inner: MemoryStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl AttemptStore for FailingOnce {
        async fn create(&self, user_id: Uuid, quiz_id: Uuid, started_at: DateTime<Utc>) -> Result<QuizAttempt> {
            self.inner.create(user_id, quiz_id, started_at).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<QuizAttempt>> {
            AttemptStore::find_by_id(&self.inner, id).await
        }

        async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<QuizAttempt>> {
            AttemptStore::find_by_ids(&self.inner, ids).await
        }

        async fn update_score(&self, id: Uuid, score: i32) -> Result<()> {
            self.inner.update_score(id, score).await
        }

        async fn submit(
            &self,
            id: Uuid,
            submitted_at: DateTime<Utc>,
            answers: &[UserAnswer],
            score: i32,
        ) -> Result<QuizAttempt> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(Error::Internal("connection reset".to_string()));
            }
            self.inner.submit(id, submitted_at, answers, score).await
        }

        async fn mark_graded(&self, id: Uuid) -> Result<()> {
            self.inner.mark_graded(id).await
        }

        async fn list_submitted_by_user(
            &self,
            user_id: Uuid,
            quiz_id: Option<Uuid>,
            offset: i64,
            limit: i64,
        ) -> Result<(Vec<QuizAttempt>, i64)> {
            self.inner.list_submitted_by_user(user_id, quiz_id, offset, limit).await
        }
    }

    #[tokio::test]
    async fn failed_submit_leaves_nothing_behind_and_can_be_retried() {
        let f = fixture().await;
        let mut stores = Stores::in_memory(f.store.clone());
        stores.attempts = Arc::new(FailingOnce {
            inner: f.store.clone(),
            failed: AtomicBool::new(false),
        });
        let access = Arc::new(ModuleAccess::new(stores.modules.clone()));
        let service = AttemptService::new(stores, access, AttemptLocks::new(), defaults());

        let started = service.start_attempt(&f.learner, f.quiz.id).await.unwrap();
        let err = service
            .submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, f.correct))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        let attempt = AttemptStore::find_by_id(&f.store, started.attempt_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert!(attempt.score.is_none());
        assert!(f.store.find_by_attempt(started.attempt_id).await.unwrap().is_empty());

        let retried = service
            .submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, f.correct))
            .await
            .unwrap();
        assert_eq!(retried.score, 100);
        assert_eq!(retried.status, AttemptStatus::Submitted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_submits_without_a_shared_lock_keep_only_the_winner() {
        let f = fixture().await;
        let stores = Stores::in_memory(f.store.clone());
        // separate lock tables stand in for two server processes
        let other = AttemptService::new(
            stores.clone(),
            Arc::new(ModuleAccess::new(stores.modules.clone())),
            AttemptLocks::new(),
            defaults(),
        );
        let started = f.service.start_attempt(&f.learner, f.quiz.id).await.unwrap();

        let (first, second) = tokio::join!(
            f.service
                .submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, f.correct)),
            other.submit_attempt(&f.learner, started.attempt_id, answers(f.question.id, Uuid::new_v4())),
        );

        let winner = match (first, second) {
            (Ok(won), Err(Error::Conflict(_))) | (Err(Error::Conflict(_)), Ok(won)) => won,
            (a, b) => panic!("expected exactly one winner, got {:?} and {:?}", a.is_ok(), b.is_ok()),
        };

        let stored = AttemptStore::find_by_id(&f.store, started.attempt_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.score, Some(winner.score));
        assert_eq!(f.store.find_by_attempt(started.attempt_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn archived_quiz_cannot_be_started() {
        let f = fixture().await;
        let mut archived = f.quiz.clone();
        archived.status = QuizStatus::Archived;
        f.store.insert_quiz(archived).await;

        let err = f.service.start_attempt(&f.learner, f.quiz.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn start_respects_the_availability_window_inclusively() {
        let f = fixture().await;
        let opens = Utc::now() - Duration::hours(1);
        let closes = Utc::now() + Duration::hours(1);
        let mut windowed = f.quiz.clone();
        windowed.start_at = Some(opens);
        windowed.end_at = Some(closes);
        f.store.insert_quiz(windowed).await;

        let early = f
            .service
            .start_attempt_at(&f.learner, f.quiz.id, opens - Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(early, Error::Forbidden(_)));

        let late = f
            .service
            .start_attempt_at(&f.learner, f.quiz.id, closes + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(late, Error::Forbidden(_)));

        tokio_test::assert_ok!(f.service.start_attempt_at(&f.learner, f.quiz.id, opens).await);
        tokio_test::assert_ok!(f.service.start_attempt_at(&f.learner, f.quiz.id, closes).await);
    }

    #[tokio::test]
    async fn future_and_expired_windows_block_start_now() {
        let f = fixture().await;
        let mut upcoming = f.quiz.clone();
        upcoming.id = Uuid::new_v4();
        upcoming.start_at = Some(Utc::now() + Duration::days(1));
        f.store.insert_quiz(upcoming.clone()).await;

        let mut ended = f.quiz.clone();
        ended.id = Uuid::new_v4();
        ended.end_at = Some(Utc::now() - Duration::days(1));
        f.store.insert_quiz(ended.clone()).await;

        let err = f.service.start_attempt(&f.learner, upcoming.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let err = f.service.start_attempt(&f.learner, ended.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
