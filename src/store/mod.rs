//! Collaborator contracts consumed by the scoring core.
//!
//! Each store is an explicitly constructed handle injected into the services;
//! nothing in the core reaches for a global connection.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::attempt::QuizAttempt;
use crate::models::module::Module;
use crate::models::question::{AnswerOption, Question};
use crate::models::quiz::Quiz;
use crate::models::user::UserSummary;
use crate::models::user_answer::{AnswerPatch, UserAnswer};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Quiz>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Quiz>>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>>;
    /// Questions of a quiz ordered by `order`, then creation time.
    async fn find_by_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>>;
    async fn find_options(&self, question_ids: &[Uuid]) -> Result<Vec<AnswerOption>>;
    /// questionId -> id of its correct option, for multiple-choice questions.
    async fn find_correct_option_map(&self, question_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>>;
    /// Inserts a question together with its options, all or nothing.
    async fn create(&self, question: Question, options: Vec<AnswerOption>) -> Result<Question>;
    /// Deletes a question and its options. Returns false if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create(&self, user_id: Uuid, quiz_id: Uuid, started_at: DateTime<Utc>) -> Result<QuizAttempt>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<QuizAttempt>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<QuizAttempt>>;
    async fn update_score(&self, id: Uuid, score: i32) -> Result<()>;
    /// Claims the attempt, stores its answers and writes its score as one
    /// unit. Fails with `Conflict` and changes nothing if the attempt was
    /// already submitted or an answer already exists.
    async fn submit(
        &self,
        id: Uuid,
        submitted_at: DateTime<Utc>,
        answers: &[UserAnswer],
        score: i32,
    ) -> Result<QuizAttempt>;
    /// Annotates a submitted attempt as graded; no-op before submission.
    async fn mark_graded(&self, id: Uuid) -> Result<()>;
    /// Submitted attempts of a user, newest first, plus the total count.
    async fn list_submitted_by_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<QuizAttempt>, i64)>;
}

#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn find_by_attempt(&self, attempt_id: Uuid) -> Result<Vec<UserAnswer>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAnswer>>;
    async fn update(&self, id: Uuid, patch: &AnswerPatch) -> Result<UserAnswer>;
    async fn find_pending(&self) -> Result<Vec<UserAnswer>>;
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn find_module(&self, id: Uuid) -> Result<Option<Module>>;
    async fn has_active_enrollment(&self, module_id: Uuid, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>>;
}

/// The bundle of store handles a service is constructed with.
#[derive(Clone)]
pub struct Stores {
    pub quizzes: Arc<dyn QuizStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub attempts: Arc<dyn AttemptStore>,
    pub answers: Arc<dyn AnswerStore>,
    pub modules: Arc<dyn ModuleStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            quizzes: store.clone(),
            questions: store.clone(),
            attempts: store.clone(),
            answers: store.clone(),
            modules: store.clone(),
            users: store,
        }
    }

    pub fn in_memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            quizzes: store.clone(),
            questions: store.clone(),
            attempts: store.clone(),
            answers: store.clone(),
            modules: store.clone(),
            users: store,
        }
    }
}
