use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{AnswerStore, AttemptStore, ModuleStore, QuestionStore, QuizStore, UserDirectory};
use crate::error::{Error, Result};
use crate::models::attempt::{AttemptStatus, QuizAttempt};
use crate::models::module::Module;
use crate::models::question::{AnswerOption, Question};
use crate::models::quiz::Quiz;
use crate::models::user::UserSummary;
use crate::models::user_answer::{AnswerPatch, ReviewStatus, UserAnswer};

const QUIZ_COLUMNS: &str = r#"
    id, module_id, title, description, status, duration_minutes, pass_score,
    max_attempts, randomize_questions, randomize_options,
    show_correct_answer_after_submit, start_at, end_at, created_by, created_at
"#;

const QUESTION_COLUMNS: &str = r#"
    id, quiz_id, question_type, question_text, explanation, points, position,
    answer_key_text, manual_grading_required, created_at
"#;

const ATTEMPT_COLUMNS: &str = "id, user_id, quiz_id, started_at, submitted_at, score, status";

const ANSWER_COLUMNS: &str = r#"
    id, attempt_id, question_id, selected_option_id, answer_text, is_correct,
    awarded_points, review_status, graded_by, graded_at
"#;

#[derive(FromRow)]
struct QuizRow {
    id: Uuid,
    module_id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    duration_minutes: Option<i32>,
    pass_score: Option<i32>,
    max_attempts: i32,
    randomize_questions: bool,
    randomize_options: bool,
    show_correct_answer_after_submit: bool,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = Error;

    fn try_from(row: QuizRow) -> Result<Self> {
        Ok(Quiz {
            id: row.id,
            module_id: row.module_id,
            title: row.title,
            description: row.description,
            status: row.status.parse().map_err(Error::Internal)?,
            duration_minutes: row.duration_minutes,
            pass_score: row.pass_score,
            max_attempts: row.max_attempts,
            randomize_questions: row.randomize_questions,
            randomize_options: row.randomize_options,
            show_correct_answer_after_submit: row.show_correct_answer_after_submit,
            start_at: row.start_at,
            end_at: row.end_at,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    quiz_id: Uuid,
    question_type: String,
    question_text: String,
    explanation: Option<String>,
    points: i32,
    position: i32,
    answer_key_text: Option<String>,
    manual_grading_required: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = Error;

    fn try_from(row: QuestionRow) -> Result<Self> {
        Ok(Question {
            id: row.id,
            quiz_id: row.quiz_id,
            question_type: row.question_type.parse().map_err(Error::Internal)?,
            text: row.question_text,
            explanation: row.explanation,
            points: row.points,
            order: row.position,
            answer_key_text: row.answer_key_text,
            manual_grading_required: row.manual_grading_required,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct OptionRow {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    is_correct: bool,
}

impl From<OptionRow> for AnswerOption {
    fn from(row: OptionRow) -> Self {
        AnswerOption {
            id: row.id,
            question_id: row.question_id,
            text: row.option_text,
            is_correct: row.is_correct,
        }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    user_id: Uuid,
    quiz_id: Uuid,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    score: Option<i32>,
    status: String,
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(QuizAttempt {
            id: row.id,
            user_id: row.user_id,
            quiz_id: row.quiz_id,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            score: row.score,
            status: row.status.parse().map_err(Error::Internal)?,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: Uuid,
    attempt_id: Uuid,
    question_id: Uuid,
    selected_option_id: Option<Uuid>,
    answer_text: Option<String>,
    is_correct: bool,
    awarded_points: i32,
    review_status: String,
    graded_by: Option<Uuid>,
    graded_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnswerRow> for UserAnswer {
    type Error = Error;

    fn try_from(row: AnswerRow) -> Result<Self> {
        Ok(UserAnswer {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            selected_option_id: row.selected_option_id,
            answer_text: row.answer_text,
            is_correct: row.is_correct,
            awarded_points: row.awarded_points,
            review_status: row.review_status.parse().map_err(Error::Internal)?,
            graded_by: row.graded_by,
            graded_at: row.graded_at,
        })
    }
}

#[derive(FromRow)]
struct ModuleRow {
    id: Uuid,
    title: String,
    is_active: bool,
    visibility: String,
    assigned_teacher_id: Option<Uuid>,
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Quiz>> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE id = $1",
            QUIZ_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Quiz::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Quiz>> {
        let rows = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE id = ANY($1)",
            QUIZ_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Question::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE id = ANY($1)",
            QUESTION_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_by_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE quiz_id = $1 ORDER BY position ASC, created_at ASC",
            QUESTION_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_options(&self, question_ids: &[Uuid]) -> Result<Vec<AnswerOption>> {
        let rows = sqlx::query_as::<_, OptionRow>(
            r#"SELECT id, question_id, option_text, is_correct
               FROM answer_options WHERE question_id = ANY($1)
               ORDER BY position ASC"#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AnswerOption::from).collect())
    }

    async fn find_correct_option_map(&self, question_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"SELECT question_id, id FROM answer_options
               WHERE question_id = ANY($1) AND is_correct = TRUE"#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn create(&self, question: Question, options: Vec<AnswerOption>) -> Result<Question> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO questions (
                id, quiz_id, question_type, question_text, explanation, points,
                position, answer_key_text, manual_grading_required, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(question.id)
        .bind(question.quiz_id)
        .bind(question.question_type.as_str())
        .bind(&question.text)
        .bind(&question.explanation)
        .bind(question.points)
        .bind(question.order)
        .bind(&question.answer_key_text)
        .bind(question.manual_grading_required)
        .bind(question.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, option) in options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO answer_options (id, question_id, option_text, is_correct, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(option.id)
            .bind(option.question_id)
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(question)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn create(&self, user_id: Uuid, quiz_id: Uuid, started_at: DateTime<Utc>) -> Result<QuizAttempt> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            INSERT INTO quiz_attempts (id, user_id, quiz_id, started_at, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(quiz_id)
        .bind(started_at)
        .bind(AttemptStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await?;
        QuizAttempt::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QuizAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(QuizAttempt::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<QuizAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = ANY($1)",
            ATTEMPT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn update_score(&self, id: Uuid, score: i32) -> Result<()> {
        let result = sqlx::query("UPDATE quiz_attempts SET score = $2 WHERE id = $1")
            .bind(id)
            .bind(score)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Attempt not found".to_string()));
        }
        Ok(())
    }

    async fn submit(
        &self,
        id: Uuid,
        submitted_at: DateTime<Utc>,
        answers: &[UserAnswer],
        score: i32,
    ) -> Result<QuizAttempt> {
        let mut tx = self.pool.begin().await?;

        // the conditional update claims the attempt; a concurrent submit
        // blocks on the row lock and then matches nothing
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            UPDATE quiz_attempts
            SET submitted_at = $2, status = $3, score = $4
            WHERE id = $1 AND submitted_at IS NULL
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .bind(submitted_at)
        .bind(AttemptStatus::Submitted.as_str())
        .bind(score)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(Error::Conflict("Attempt already submitted".to_string()));
        };

        for answer in answers {
            sqlx::query(
                r#"
                INSERT INTO user_answers (
                    id, attempt_id, question_id, selected_option_id, answer_text,
                    is_correct, awarded_points, review_status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(answer.id)
            .bind(id)
            .bind(answer.question_id)
            .bind(answer.selected_option_id)
            .bind(&answer.answer_text)
            .bind(answer.is_correct)
            .bind(answer.awarded_points)
            .bind(answer.review_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::Conflict("Answers for this attempt already exist".to_string())
                }
                other => Error::from(other),
            })?;
        }

        tx.commit().await?;
        QuizAttempt::try_from(row)
    }

    async fn mark_graded(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE quiz_attempts SET status = $2 WHERE id = $1 AND submitted_at IS NOT NULL",
        )
        .bind(id)
        .bind(AttemptStatus::Graded.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_submitted_by_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<QuizAttempt>, i64)> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            SELECT {} FROM quiz_attempts
            WHERE user_id = $1
              AND submitted_at IS NOT NULL
              AND ($2::uuid IS NULL OR quiz_id = $2)
            ORDER BY submitted_at DESC
            LIMIT $3 OFFSET $4
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(user_id)
        .bind(quiz_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM quiz_attempts
            WHERE user_id = $1
              AND submitted_at IS NOT NULL
              AND ($2::uuid IS NULL OR quiz_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((convert_all(rows)?, total))
    }
}

#[async_trait]
impl AnswerStore for PgStore {
    async fn find_by_attempt(&self, attempt_id: Uuid) -> Result<Vec<UserAnswer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {} FROM user_answers WHERE attempt_id = $1 ORDER BY created_at ASC",
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAnswer>> {
        let row = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {} FROM user_answers WHERE id = $1",
            ANSWER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserAnswer::try_from).transpose()
    }

    async fn update(&self, id: Uuid, patch: &AnswerPatch) -> Result<UserAnswer> {
        let row = sqlx::query_as::<_, AnswerRow>(&format!(
            r#"
            UPDATE user_answers
            SET awarded_points = $2, is_correct = $3, review_status = $4,
                graded_by = $5, graded_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        ))
        .bind(id)
        .bind(patch.awarded_points)
        .bind(patch.is_correct)
        .bind(patch.review_status.as_str())
        .bind(patch.graded_by)
        .bind(patch.graded_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => UserAnswer::try_from(row),
            None => Err(Error::NotFound("User answer not found".to_string())),
        }
    }

    async fn find_pending(&self) -> Result<Vec<UserAnswer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {} FROM user_answers WHERE review_status = $1 ORDER BY created_at ASC",
            ANSWER_COLUMNS
        ))
        .bind(ReviewStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl ModuleStore for PgStore {
    async fn find_module(&self, id: Uuid) -> Result<Option<Module>> {
        let row = sqlx::query_as::<_, ModuleRow>(
            "SELECT id, title, is_active, visibility, assigned_teacher_id FROM modules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Module {
                id: row.id,
                title: row.title,
                is_active: row.is_active,
                visibility: row.visibility.parse().map_err(Error::Internal)?,
                assigned_teacher_id: row.assigned_teacher_id,
            })
        })
        .transpose()
    }

    async fn has_active_enrollment(&self, module_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                SELECT 1 FROM enrollments
                WHERE module_id = $1 AND user_id = $2 AND status = 'active'
            )"#,
        )
        .bind(module_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, name, email FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, email)| UserSummary { id, name, email })
            .collect())
    }
}
