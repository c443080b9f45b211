use crate::error::EvaluationError;
use crate::models::answer::UserAnswerSet;
use crate::models::evaluation::EvaluationResult;
use crate::models::question::Quiz;
use crate::services::grading_service::GradingService;
use crate::services::llm_service::LlmBackend;
use crate::services::{prompt_service, response_parser};
use std::sync::Arc;
use std::time::Duration;

/// Runs one evaluation end to end: prompt, model call, parse, reconcile.
///
/// Holds no per-request state, so one instance serves concurrent
/// submissions and dropping the returned future abandons the model call
/// without side effects.
#[derive(Clone)]
pub struct EvalService {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
}

impl EvalService {
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn evaluate(
        &self,
        quiz: &Quiz,
        answers: &UserAnswerSet,
    ) -> Result<EvaluationResult, EvaluationError> {
        Self::check_gradable(quiz, answers)?;

        let prompt = prompt_service::build_evaluation_prompt(quiz, answers);
        let options = prompt_service::evaluation_options();

        tracing::info!(
            quiz_id = %answers.quiz_id,
            user_id = %answers.user_id,
            questions = quiz.questions.len(),
            answered = answers.answers.len(),
            "Evaluating submission"
        );

        let raw = match tokio::time::timeout(self.timeout, self.backend.generate(&prompt, &options)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::error!(quiz_id = %answers.quiz_id, error = %e, "Evaluation model call failed");
                return Err(EvaluationError::ModelUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::error!(quiz_id = %answers.quiz_id, timeout_secs = self.timeout.as_secs_f64(), "Evaluation model call timed out");
                return Err(EvaluationError::ModelUnavailable(format!(
                    "model did not respond within {:?}",
                    self.timeout
                )));
            }
        };

        let parsed = response_parser::parse_evaluation_response(&raw)?;

        if parsed.question_results.len() != quiz.questions.len() {
            tracing::warn!(
                quiz_id = %answers.quiz_id,
                expected = quiz.questions.len(),
                returned = parsed.question_results.len(),
                "Model returned a different number of results than the quiz has questions; scoring what was returned"
            );
        }

        let breakdown = GradingService::reconcile(quiz, &parsed.question_results)?;

        if let Some(reported) = parsed.reported.points_earned {
            if (reported - breakdown.overall_score.points_earned).abs() > f64::EPSILON {
                tracing::info!(
                    quiz_id = %answers.quiz_id,
                    reported,
                    reconciled = breakdown.overall_score.points_earned,
                    "Discarding model-reported score"
                );
            }
        }

        tracing::info!(
            quiz_id = %answers.quiz_id,
            points_earned = breakdown.overall_score.points_earned,
            total_points = breakdown.overall_score.total_points,
            grade = %breakdown.overall_score.grade,
            "Evaluation complete"
        );

        Ok(EvaluationResult {
            user_id: answers.user_id.clone(),
            quiz_id: answers.quiz_id.clone(),
            timestamp: crate::utils::time::now(),
            overall_score: breakdown.overall_score,
            performance_by_topic: breakdown.performance_by_topic,
            performance_by_difficulty: breakdown.performance_by_difficulty,
            question_results: breakdown.question_results,
            recommendations: parsed.recommendations,
        })
    }

    fn check_gradable(quiz: &Quiz, answers: &UserAnswerSet) -> Result<(), EvaluationError> {
        if !quiz.is_gradable() {
            return Err(EvaluationError::InvalidInput("quiz has no questions".to_string()));
        }
        if answers.quiz_id.trim().is_empty() {
            return Err(EvaluationError::InvalidInput("answer set has no quiz_id".to_string()));
        }
        if let Some(id) = quiz.id.as_deref() {
            if id != answers.quiz_id {
                return Err(EvaluationError::InvalidInput(format!(
                    "answers reference quiz '{}' but quiz '{}' was supplied",
                    answers.quiz_id, id
                )));
            }
        }

        let unknown: Vec<&str> = answers
            .answers
            .keys()
            .map(|k| k.as_str())
            .filter(|k| quiz.question(k).is_none())
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(quiz_id = %answers.quiz_id, unknown = ?unknown, "Ignoring answers for unknown questions");
        }
        Ok(())
    }
}
