use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AnswerStore, AttemptStore, ModuleStore, QuestionStore, QuizStore, UserDirectory};
use crate::error::{Error, Result};
use crate::models::attempt::{AttemptStatus, QuizAttempt};
use crate::models::module::Module;
use crate::models::question::{AnswerOption, Question};
use crate::models::quiz::Quiz;
use crate::models::user::UserSummary;
use crate::models::user_answer::{AnswerPatch, ReviewStatus, UserAnswer};

#[derive(Default)]
struct State {
    quizzes: HashMap<Uuid, Quiz>,
    questions: HashMap<Uuid, Question>,
    options: Vec<AnswerOption>,
    attempts: HashMap<Uuid, QuizAttempt>,
    answers: Vec<UserAnswer>,
    modules: HashMap<Uuid, Module>,
    enrollments: HashSet<(Uuid, Uuid)>,
    users: HashMap<Uuid, UserSummary>,
}

/// Process-local store with the same semantics as the Postgres one.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_quiz(&self, quiz: Quiz) {
        self.state.write().await.quizzes.insert(quiz.id, quiz);
    }

    pub async fn insert_module(&self, module: Module) {
        self.state.write().await.modules.insert(module.id, module);
    }

    pub async fn insert_user(&self, user: UserSummary) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn enroll(&self, module_id: Uuid, user_id: Uuid) {
        self.state.write().await.enrollments.insert((module_id, user_id));
    }

    /// Stores an attempt as-is, e.g. one started in the past.
    pub async fn insert_attempt(&self, attempt: QuizAttempt) {
        self.state.write().await.attempts.insert(attempt.id, attempt);
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Quiz>> {
        Ok(self.state.read().await.quizzes.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Quiz>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.quizzes.get(id).cloned()).collect())
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>> {
        Ok(self.state.read().await.questions.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let state = self.state.read().await;
        let unique: HashSet<&Uuid> = ids.iter().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| state.questions.get(id).cloned())
            .collect())
    }

    async fn find_by_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let state = self.state.read().await;
        let mut questions: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(questions)
    }

    async fn find_options(&self, question_ids: &[Uuid]) -> Result<Vec<AnswerOption>> {
        let state = self.state.read().await;
        Ok(state
            .options
            .iter()
            .filter(|o| question_ids.contains(&o.question_id))
            .cloned()
            .collect())
    }

    async fn find_correct_option_map(&self, question_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .options
            .iter()
            .filter(|o| o.is_correct && question_ids.contains(&o.question_id))
            .map(|o| (o.question_id, o.id))
            .collect())
    }

    async fn create(&self, question: Question, options: Vec<AnswerOption>) -> Result<Question> {
        let mut state = self.state.write().await;
        state.questions.insert(question.id, question.clone());
        state.options.extend(options);
        Ok(question)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let existed = state.questions.remove(&id).is_some();
        state.options.retain(|o| o.question_id != id);
        Ok(existed)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn create(&self, user_id: Uuid, quiz_id: Uuid, started_at: DateTime<Utc>) -> Result<QuizAttempt> {
        let attempt = QuizAttempt {
            id: Uuid::new_v4(),
            user_id,
            quiz_id,
            started_at,
            submitted_at: None,
            score: None,
            status: AttemptStatus::InProgress,
        };
        self.state
            .write()
            .await
            .attempts
            .insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QuizAttempt>> {
        Ok(self.state.read().await.attempts.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<QuizAttempt>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.attempts.get(id).cloned()).collect())
    }

    async fn update_score(&self, id: Uuid, score: i32) -> Result<()> {
        let mut state = self.state.write().await;
        let attempt = state
            .attempts
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;
        attempt.score = Some(score);
        Ok(())
    }

    async fn submit(
        &self,
        id: Uuid,
        submitted_at: DateTime<Utc>,
        answers: &[UserAnswer],
        score: i32,
    ) -> Result<QuizAttempt> {
        let mut state = self.state.write().await;
        let attempt = state
            .attempts
            .get(&id)
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;
        if attempt.submitted_at.is_some() {
            return Err(Error::Conflict("Attempt already submitted".to_string()));
        }

        let mut seen: HashSet<(Uuid, Uuid)> = state
            .answers
            .iter()
            .map(|a| (a.attempt_id, a.question_id))
            .collect();
        for answer in answers {
            if answer.attempt_id != id || !seen.insert((answer.attempt_id, answer.question_id)) {
                return Err(Error::Conflict(
                    "Answers for this attempt already exist".to_string(),
                ));
            }
        }

        state.answers.extend(answers.iter().cloned());
        let attempt = state
            .attempts
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;
        attempt.submitted_at = Some(submitted_at);
        attempt.score = Some(score);
        attempt.status = AttemptStatus::derive(true, false);
        Ok(attempt.clone())
    }

    async fn mark_graded(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(attempt) = state.attempts.get_mut(&id) {
            attempt.status = AttemptStatus::derive(attempt.is_submitted(), true);
        }
        Ok(())
    }

    async fn list_submitted_by_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<QuizAttempt>, i64)> {
        let state = self.state.read().await;
        let mut matching: Vec<QuizAttempt> = state
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.submitted_at.is_some())
            .filter(|a| quiz_id.map_or(true, |q| a.quiz_id == q))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl AnswerStore for MemoryStore {
    async fn find_by_attempt(&self, attempt_id: Uuid) -> Result<Vec<UserAnswer>> {
        let state = self.state.read().await;
        Ok(state
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAnswer>> {
        let state = self.state.read().await;
        Ok(state.answers.iter().find(|a| a.id == id).cloned())
    }

    async fn update(&self, id: Uuid, patch: &AnswerPatch) -> Result<UserAnswer> {
        let mut state = self.state.write().await;
        let answer = state
            .answers
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound("User answer not found".to_string()))?;
        answer.apply(patch);
        Ok(answer.clone())
    }

    async fn find_pending(&self) -> Result<Vec<UserAnswer>> {
        let state = self.state.read().await;
        Ok(state
            .answers
            .iter()
            .filter(|a| a.review_status == ReviewStatus::Pending)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn find_module(&self, id: Uuid) -> Result<Option<Module>> {
        Ok(self.state.read().await.modules.get(&id).cloned())
    }

    async fn has_active_enrollment(&self, module_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .enrollments
            .contains(&(module_id, user_id)))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(attempt_id: Uuid, question_id: Uuid) -> UserAnswer {
        UserAnswer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id,
            selected_option_id: None,
            answer_text: Some("foo".to_string()),
            is_correct: false,
            awarded_points: 0,
            review_status: ReviewStatus::Pending,
            graded_by: None,
            graded_at: None,
        }
    }

    #[tokio::test]
    async fn submit_with_duplicate_answers_changes_nothing() {
        let store = MemoryStore::new();
        let attempt = AttemptStore::create(&store, Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
        let q = Uuid::new_v4();

        let batch = vec![answer(attempt.id, Uuid::new_v4()), answer(attempt.id, q), answer(attempt.id, q)];
        let err = store.submit(attempt.id, Utc::now(), &batch, 50).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        assert!(store.find_by_attempt(attempt.id).await.unwrap().is_empty());
        let reloaded = AttemptStore::find_by_id(&store, attempt.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, AttemptStatus::InProgress);
        assert!(reloaded.score.is_none());
    }

    #[tokio::test]
    async fn second_submit_conflicts_and_keeps_the_first() {
        let store = MemoryStore::new();
        let attempt = AttemptStore::create(&store, Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap();

        let first = store
            .submit(attempt.id, Utc::now(), &[answer(attempt.id, Uuid::new_v4())], 80)
            .await
            .unwrap();
        assert_eq!(first.status, AttemptStatus::Submitted);
        assert_eq!(first.score, Some(80));

        let err = tokio_test::assert_err!(
            store
                .submit(attempt.id, Utc::now(), &[answer(attempt.id, Uuid::new_v4())], 10)
                .await
        );
        assert!(matches!(err, Error::Conflict(_)));

        let reloaded = AttemptStore::find_by_id(&store, attempt.id).await.unwrap().unwrap();
        assert_eq!(reloaded.score, Some(80));
        assert_eq!(store.find_by_attempt(attempt.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_graded_ignores_unsubmitted_attempts() {
        let store = MemoryStore::new();
        let attempt = AttemptStore::create(&store, Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap();

        tokio_test::assert_ok!(store.mark_graded(attempt.id).await);
        let reloaded = AttemptStore::find_by_id(&store, attempt.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, AttemptStatus::InProgress);
    }
}
