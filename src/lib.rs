pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::services::{
    access_service::{AccessPolicy, ModuleAccess},
    attempt_locks::AttemptLocks,
    attempt_service::{AttemptService, QuizDefaults},
    question_service::QuestionService,
    review_service::ReviewService,
};
use crate::store::Stores;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub attempt_service: AttemptService,
    pub review_service: ReviewService,
    pub question_service: QuestionService,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let access: Arc<dyn AccessPolicy> = Arc::new(ModuleAccess::new(stores.modules.clone()));
        Self::with_access(config, stores, access)
    }

    /// Wires the services around an explicit authorization policy. Submit and
    /// grade share one lock table so their recomputes never interleave.
    pub fn with_access(config: Config, stores: Stores, access: Arc<dyn AccessPolicy>) -> Self {
        let locks = AttemptLocks::new();
        let attempt_service = AttemptService::new(
            stores.clone(),
            access.clone(),
            locks.clone(),
            QuizDefaults::from(&config),
        );
        let review_service = ReviewService::new(stores.clone(), access.clone(), locks);
        let question_service = QuestionService::new(stores, access);

        Self {
            config,
            attempt_service,
            review_service,
            question_service,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
