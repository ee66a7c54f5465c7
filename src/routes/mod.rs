pub mod grading;
pub mod health;
pub mod questions;
pub mod quiz;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::auth::require_session;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/quizzes/:id", get(quiz::get_quiz))
        .route("/api/quizzes/:id/start", post(quiz::start_attempt))
        .route("/api/attempts/:id", get(quiz::get_attempt))
        .route("/api/attempts/:id/submit", post(quiz::submit_attempt))
        .route("/api/me/attempts", get(quiz::list_my_attempts))
        .route("/api/grading/pending", get(grading::list_pending))
        .route("/api/grading/answers/:id", post(grading::grade_answer))
        .route(
            "/api/admin/quizzes/:id/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/api/admin/questions/:id", delete(questions::delete_question))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
