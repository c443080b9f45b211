use crate::error::EvaluationError;
use crate::models::evaluation::{
    is_allowed_points, is_full_credit, Grade, OverallScore, PerformanceByDifficulty, QuestionResult,
    TopicPerformance,
};
use crate::models::question::{Question, Quiz};
use std::collections::HashMap;

const UNKNOWN_TOPIC: &str = "Unknown";

/// Authoritative numbers for one evaluation. Whatever totals the model
/// reported are discarded in favour of these.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub overall_score: OverallScore,
    pub performance_by_topic: Vec<TopicPerformance>,
    pub performance_by_difficulty: PerformanceByDifficulty,
    pub question_results: Vec<QuestionResult>,
}

pub struct GradingService;

impl GradingService {
    pub fn reconcile(quiz: &Quiz, results: &[QuestionResult]) -> Result<ScoreBreakdown, EvaluationError> {
        let question_results = Self::normalize(results)?;
        let index = quiz.index_by_id();

        Ok(ScoreBreakdown {
            overall_score: Self::overall_score(&question_results)?,
            performance_by_topic: Self::performance_by_topic(&index, &question_results),
            performance_by_difficulty: Self::performance_by_difficulty(&index, &question_results),
            question_results,
        })
    }

    /// Partial credit is never "correct"; full credit always is.
    fn normalize(results: &[QuestionResult]) -> Result<Vec<QuestionResult>, EvaluationError> {
        results
            .iter()
            .map(|r| {
                if !is_allowed_points(r.points_awarded) {
                    return Err(EvaluationError::Reconciliation(format!(
                        "question {} carries {} points after parsing",
                        r.question_id, r.points_awarded
                    )));
                }
                let mut r = r.clone();
                r.is_correct = is_full_credit(r.points_awarded);
                Ok(r)
            })
            .collect()
    }

    pub fn overall_score(results: &[QuestionResult]) -> Result<OverallScore, EvaluationError> {
        let points_earned: f64 = results.iter().map(|r| r.points_awarded).sum();
        let total_points = results.len();
        let percentage = percentage(points_earned, total_points);

        if !(0.0..=100.0).contains(&percentage) {
            return Err(EvaluationError::Reconciliation(format!(
                "percentage {} out of bounds ({} of {})",
                percentage, points_earned, total_points
            )));
        }

        Ok(OverallScore {
            points_earned,
            total_points,
            percentage,
            grade: Grade::from_percentage(percentage),
        })
    }

    /// Results whose question id is not in the quiz are skipped.
    pub fn performance_by_difficulty(
        index: &HashMap<&str, &Question>,
        results: &[QuestionResult],
    ) -> PerformanceByDifficulty {
        let mut perf = PerformanceByDifficulty::default();
        for r in results {
            if let Some(q) = index.get(r.question_id.as_str()) {
                let bucket = perf.bucket_mut(q.difficulty);
                bucket.total += 1;
                if r.is_correct {
                    bucket.correct += 1;
                }
            }
        }
        perf
    }

    /// Topics appear in the order they are first seen in the results.
    pub fn performance_by_topic(
        index: &HashMap<&str, &Question>,
        results: &[QuestionResult],
    ) -> Vec<TopicPerformance> {
        let mut order: Vec<TopicPerformance> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for r in results {
            let Some(q) = index.get(r.question_id.as_str()) else {
                continue;
            };
            let topic = if q.topic.trim().is_empty() {
                UNKNOWN_TOPIC
            } else {
                q.topic.as_str()
            };
            let pos = *positions.entry(topic).or_insert_with(|| {
                order.push(TopicPerformance {
                    topic: topic.to_string(),
                    questions_answered: 0,
                    correct_answers: 0,
                    percentage: 0.0,
                });
                order.len() - 1
            });
            let entry = &mut order[pos];
            entry.questions_answered += 1;
            if r.is_correct {
                entry.correct_answers += 1;
            }
        }

        for entry in &mut order {
            entry.percentage = percentage(entry.correct_answers as f64, entry.questions_answered);
        }
        order
    }
}

pub fn percentage(part: f64, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part / whole as f64 * 100.0
    }
}
