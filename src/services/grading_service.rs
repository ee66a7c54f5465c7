use std::collections::HashMap;

use uuid::Uuid;

use crate::dto::attempt_dto::SubmittedAnswer;
use crate::models::question::{Question, QuestionType};
use crate::models::user_answer::{ReviewStatus, UserAnswer};

/// Result of grading one submitted answer against its question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeOutcome {
    pub is_correct: bool,
    pub awarded_points: i32,
    pub review_status: ReviewStatus,
    pub selected_option_id: Option<Uuid>,
    pub answer_text: Option<String>,
}

/// Answers produced for one submission, ready to be persisted as a batch.
#[derive(Debug, Clone)]
pub struct GradedBatch {
    pub answers: Vec<UserAnswer>,
    pub correct_count: usize,
    pub pending_count: usize,
    /// Submitted entries not persisted: unknown questions and superseded
    /// duplicates.
    pub dropped: usize,
}

pub struct GradingService;

impl GradingService {
    /// Grades a single answer. `correct_option` is the question's correct
    /// option id when it is multiple-choice.
    pub fn grade(
        question: &Question,
        correct_option: Option<Uuid>,
        submitted: &SubmittedAnswer,
    ) -> GradeOutcome {
        match question.question_type {
            QuestionType::MultipleChoice => {
                let selected = submitted.selected_option_id;
                let is_correct = matches!((correct_option, selected), (Some(c), Some(s)) if c == s);
                GradeOutcome {
                    is_correct,
                    awarded_points: if is_correct { question.points } else { 0 },
                    review_status: ReviewStatus::AutoGraded,
                    selected_option_id: selected,
                    answer_text: None,
                }
            }
            QuestionType::Essay => {
                let text = submitted
                    .answer_text
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                match question.answer_key() {
                    None => GradeOutcome {
                        is_correct: false,
                        awarded_points: 0,
                        review_status: ReviewStatus::Pending,
                        selected_option_id: None,
                        answer_text: Some(text),
                    },
                    Some(key) => {
                        let is_correct = key.to_lowercase() == text.to_lowercase();
                        GradeOutcome {
                            is_correct,
                            awarded_points: if is_correct { question.points } else { 0 },
                            review_status: ReviewStatus::AutoGraded,
                            selected_option_id: None,
                            answer_text: Some(text),
                        }
                    }
                }
            }
        }
    }

    /// Grades every submitted answer whose question is known.
    ///
    /// `correct_options` must be looked up once for the whole batch. Answers
    /// naming an unknown question are dropped and counted nowhere. When the
    /// same question appears twice, the last answer wins.
    pub fn grade_batch(
        attempt_id: Uuid,
        questions: &HashMap<Uuid, Question>,
        correct_options: &HashMap<Uuid, Uuid>,
        submitted: &[SubmittedAnswer],
    ) -> GradedBatch {
        let mut latest: Vec<&SubmittedAnswer> = Vec::with_capacity(submitted.len());
        let mut position: HashMap<Uuid, usize> = HashMap::new();
        for answer in submitted {
            match position.get(&answer.question_id) {
                Some(&idx) => latest[idx] = answer,
                None => {
                    position.insert(answer.question_id, latest.len());
                    latest.push(answer);
                }
            }
        }

        let mut batch = GradedBatch {
            answers: Vec::with_capacity(latest.len()),
            correct_count: 0,
            pending_count: 0,
            dropped: 0,
        };

        for answer in latest {
            let Some(question) = questions.get(&answer.question_id) else {
                batch.dropped += 1;
                continue;
            };

            let outcome = Self::grade(question, correct_options.get(&question.id).copied(), answer);
            if outcome.is_correct {
                batch.correct_count += 1;
            }
            if outcome.review_status == ReviewStatus::Pending {
                batch.pending_count += 1;
            }

            batch.answers.push(UserAnswer {
                id: Uuid::new_v4(),
                attempt_id,
                question_id: question.id,
                selected_option_id: outcome.selected_option_id,
                answer_text: outcome.answer_text,
                is_correct: outcome.is_correct,
                awarded_points: outcome.awarded_points,
                review_status: outcome.review_status,
                graded_by: None,
                graded_at: None,
            });
        }

        batch.dropped += submitted.len() - position.len();
        batch
    }
}
