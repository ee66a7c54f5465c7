use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::dto::question_dto::{CreateQuestionPayload, QuestionResponse};
use crate::error::{Error, Result};
use crate::models::question::{AnswerOption, Question, QuestionType};
use crate::models::quiz::Quiz;
use crate::models::user::Caller;
use crate::services::access_service::AccessPolicy;
use crate::services::attempt_service::group_options;
use crate::store::Stores;
use crate::utils::time::now;

/// Question bank authoring for reviewers of a quiz.
#[derive(Clone)]
pub struct QuestionService {
    stores: Stores,
    access: Arc<dyn AccessPolicy>,
}

impl QuestionService {
    pub fn new(stores: Stores, access: Arc<dyn AccessPolicy>) -> Self {
        Self { stores, access }
    }

    async fn authorize(&self, caller: &Caller, quiz_id: Uuid) -> Result<Quiz> {
        if !caller.role.is_reviewer() {
            return Err(Error::Forbidden("Only teachers and admins can manage questions".to_string()));
        }
        let quiz = self
            .stores
            .quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))?;
        if !self.access.can_review_quiz(caller, &quiz).await? {
            return Err(Error::Forbidden("You cannot manage this quiz".to_string()));
        }
        Ok(quiz)
    }

    pub async fn list(&self, caller: &Caller, quiz_id: Uuid) -> Result<Vec<QuestionResponse>> {
        let quiz = self.authorize(caller, quiz_id).await?;
        let questions = self.stores.questions.find_by_quiz(quiz.id).await?;
        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let mut options = group_options(self.stores.questions.find_options(&ids).await?);

        Ok(questions
            .into_iter()
            .map(|q| {
                let opts = options.remove(&q.id).unwrap_or_default();
                QuestionResponse::from_parts(q, opts)
            })
            .collect())
    }

    #[instrument(skip(self, caller, payload), fields(user_id = %caller.user_id))]
    pub async fn create(
        &self,
        caller: &Caller,
        quiz_id: Uuid,
        payload: CreateQuestionPayload,
    ) -> Result<QuestionResponse> {
        let quiz = self.authorize(caller, quiz_id).await?;
        payload.validate()?;

        let text = payload.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::ValidationFailed("Question text is required".to_string()));
        }

        let question_id = Uuid::new_v4();
        let (answer_key_text, options) = match payload.question_type {
            QuestionType::MultipleChoice => {
                let options = build_options(question_id, &payload)?;
                (None, options)
            }
            QuestionType::Essay => {
                let key = payload
                    .answer_key_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string);
                (key, Vec::new())
            }
        };

        let order = match payload.order {
            Some(order) => order,
            None => self.stores.questions.find_by_quiz(quiz.id).await?.len() as i32 + 1,
        };

        let question = Question {
            id: question_id,
            quiz_id: quiz.id,
            question_type: payload.question_type,
            text,
            explanation: payload
                .explanation
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            points: payload.points,
            order,
            manual_grading_required: Question::requires_manual_grading(
                payload.question_type,
                answer_key_text.as_deref(),
            ),
            answer_key_text,
            created_at: now(),
        };

        let created = self.stores.questions.create(question, options.clone()).await?;
        tracing::info!(question_id = %created.id, %quiz_id, "question created");
        Ok(QuestionResponse::from_parts(created, options))
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete(&self, caller: &Caller, question_id: Uuid) -> Result<()> {
        let question = self
            .stores
            .questions
            .find_by_id(question_id)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;
        self.authorize(caller, question.quiz_id).await?;

        if !self.stores.questions.delete(question.id).await? {
            return Err(Error::NotFound("Question not found".to_string()));
        }
        tracing::info!("question deleted");
        Ok(())
    }
}

/// At least two non-empty options, exactly one marked correct.
fn build_options(question_id: Uuid, payload: &CreateQuestionPayload) -> Result<Vec<AnswerOption>> {
    let options: Vec<AnswerOption> = payload
        .options
        .iter()
        .filter(|o| !o.text.trim().is_empty())
        .map(|o| AnswerOption {
            id: Uuid::new_v4(),
            question_id,
            text: o.text.trim().to_string(),
            is_correct: o.is_correct,
        })
        .collect();

    if options.len() < 2 {
        return Err(Error::ValidationFailed(
            "Multiple-choice questions need at least two options".to_string(),
        ));
    }
    match options.iter().filter(|o| o.is_correct).count() {
        1 => Ok(options),
        0 => Err(Error::ValidationFailed("Mark one option as correct".to_string())),
        _ => Err(Error::ValidationFailed(
            "Only one option may be marked correct".to_string(),
        )),
    }
}
