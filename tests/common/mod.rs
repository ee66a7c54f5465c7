#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

use quiz_backend::{
    config::Config,
    middleware::auth::encode_session_token,
    models::{
        module::{Module, Visibility},
        question::{AnswerOption, Question, QuestionType},
        quiz::{Quiz, QuizStatus},
        user::{Role, UserSummary},
    },
    routes::create_router,
    store::{MemoryStore, Stores},
    AppState,
};

pub const SECRET: &str = "test_secret_key";

pub struct Seed {
    pub quiz: Quiz,
    pub mc1: Question,
    pub mc1_correct: Uuid,
    pub mc2: Question,
    pub mc2_wrong: Uuid,
    pub essay: Question,
    pub keyed_essay: Question,
}

pub struct TestApp {
    pub store: MemoryStore,
    pub stores: Stores,
    pub router: Router,
    pub teacher_id: Uuid,
    pub learner_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let stores = Stores::in_memory(store.clone());
        let router = create_router(AppState::new(Config::for_tests(SECRET), stores.clone()));

        let teacher_id = Uuid::new_v4();
        let learner_id = Uuid::new_v4();
        store
            .insert_user(UserSummary {
                id: learner_id,
                name: "Siti".into(),
                email: "siti@example.com".into(),
            })
            .await;

        Self {
            store,
            stores,
            router,
            teacher_id,
            learner_id,
        }
    }

    pub fn token(&self, user_id: Uuid, role: Role) -> String {
        encode_session_token(user_id, role, None, SECRET, Duration::hours(1)).expect("token")
    }

    pub fn learner_token(&self) -> String {
        self.token(self.learner_id, Role::Learner)
    }

    pub fn teacher_token(&self) -> String {
        self.token(self.teacher_id, Role::Teacher)
    }

    /// Quiz with two 10-point multiple-choice questions, a keyless 20-point
    /// essay and a keyed 5-point essay.
    pub async fn seed_quiz(&self) -> Seed {
        let module = Module {
            id: Uuid::new_v4(),
            title: "Geography".into(),
            is_active: true,
            visibility: Visibility::Public,
            assigned_teacher_id: Some(self.teacher_id),
        };
        self.store.insert_module(module.clone()).await;

        let quiz = Quiz {
            id: Uuid::new_v4(),
            module_id: module.id,
            title: "Capitals".into(),
            description: Some("World capitals".into()),
            status: QuizStatus::Published,
            duration_minutes: Some(30),
            pass_score: Some(70),
            max_attempts: 1,
            randomize_questions: false,
            randomize_options: false,
            show_correct_answer_after_submit: true,
            start_at: None,
            end_at: None,
            created_by: self.teacher_id,
            created_at: Utc::now(),
        };
        self.store.insert_quiz(quiz.clone()).await;

        let (mc1, mc1_correct, _) = self.multiple_choice(&quiz, 1).await;
        let (mc2, _, mc2_wrong) = self.multiple_choice(&quiz, 2).await;
        let essay = self.essay(&quiz, 3, 20, None).await;
        let keyed_essay = self.essay(&quiz, 4, 5, Some("Jakarta")).await;

        Seed {
            quiz,
            mc1,
            mc1_correct,
            mc2,
            mc2_wrong,
            essay,
            keyed_essay,
        }
    }

    /// Returns the question, its correct option and one wrong option.
    async fn multiple_choice(&self, quiz: &Quiz, order: i32) -> (Question, Uuid, Uuid) {
        let question = Question {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            question_type: QuestionType::MultipleChoice,
            text: format!("Multiple choice #{}", order),
            explanation: None,
            points: 10,
            order,
            answer_key_text: None,
            manual_grading_required: false,
            created_at: Utc::now(),
        };
        let options: Vec<AnswerOption> = ["A", "B", "C", "D"]
            .iter()
            .map(|text| AnswerOption {
                id: Uuid::new_v4(),
                question_id: question.id,
                text: text.to_string(),
                is_correct: *text == "B",
            })
            .collect();
        let correct = options[1].id;
        let wrong = options[0].id;
        self.stores
            .questions
            .create(question.clone(), options)
            .await
            .expect("seed question");
        (question, correct, wrong)
    }

    async fn essay(&self, quiz: &Quiz, order: i32, points: i32, key: Option<&str>) -> Question {
        let question = Question {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            question_type: QuestionType::Essay,
            text: format!("Essay #{}", order),
            explanation: None,
            points,
            order,
            answer_key_text: key.map(str::to_string),
            manual_grading_required: Question::requires_manual_grading(QuestionType::Essay, key),
            created_at: Utc::now(),
        };
        self.stores
            .questions
            .create(question.clone(), vec![])
            .await
            .expect("seed essay");
        question
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }
}
