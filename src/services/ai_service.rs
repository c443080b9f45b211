use crate::error::GenerationError;
use crate::models::question::{Difficulty, Question, QuestionType, Quiz};
use crate::services::llm_service::LlmBackend;
use crate::services::{prompt_service, response_parser};
use rand::seq::SliceRandom;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const SUBJECTS: [&str; 11] = [
    "Computer Science",
    "Python Programming",
    "JavaScript Programming",
    "Artificial Intelligence & Machine Learning",
    "Data Science",
    "Cybersecurity",
    "Cloud Computing",
    "Database Management",
    "Operating Systems",
    "Computer Networks",
    "Software Engineering",
];

const CODING_SUBJECTS: [&str; 3] = ["Python Programming", "JavaScript Programming", "Computer Science"];

pub fn is_known_subject(subject: &str) -> bool {
    SUBJECTS.contains(&subject)
}

pub fn subject_includes_coding(subject: &str) -> bool {
    CODING_SUBJECTS.iter().any(|s| s.eq_ignore_ascii_case(subject))
}

#[derive(Clone)]
pub struct AIService {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
}

impl AIService {
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn generate_quiz(
        &self,
        subject: &str,
        difficulty: Difficulty,
        num_questions: usize,
        include_coding: bool,
    ) -> Result<Quiz, GenerationError> {
        let prompt = prompt_service::build_generation_prompt(subject, difficulty, num_questions, include_coding);
        let options = prompt_service::generation_options();

        tracing::info!(subject, %difficulty, num_questions, include_coding, "Generating quiz");
        let raw = match tokio::time::timeout(self.timeout, self.backend.generate(&prompt, &options)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(GenerationError::ModelUnavailable(e.to_string())),
            Err(_) => {
                return Err(GenerationError::ModelUnavailable(format!(
                    "model did not respond within {:?}",
                    self.timeout
                )))
            }
        };

        let doc = response_parser::parse_json_document(&raw)
            .map_err(|e| GenerationError::malformed(format!("response is not valid JSON: {}", e), &raw))?;
        if !doc.get("quiz_metadata").map(|m| m.is_object()).unwrap_or(false) {
            return Err(GenerationError::malformed("missing 'quiz_metadata' object", &raw));
        }

        let mut rng = rand::thread_rng();
        let questions = sanitize_questions(&doc, subject, difficulty, num_questions, &mut rng)
            .ok_or_else(|| GenerationError::malformed("'questions' is missing or not a list", &raw))?;
        if questions.is_empty() {
            return Err(GenerationError::malformed("no usable questions in response", &raw));
        }

        let quiz = Quiz::new(subject, questions);
        tracing::info!(
            subject,
            total = quiz.metadata.total_questions,
            easy = quiz.metadata.difficulty_distribution.easy,
            medium = quiz.metadata.difficulty_distribution.medium,
            hard = quiz.metadata.difficulty_distribution.hard,
            "Quiz generated"
        );
        Ok(quiz)
    }
}

/// Turns the model's question list into a usable one. Returns `None` when
/// there is no question list at all.
pub fn sanitize_questions(
    raw: &JsonValue,
    subject: &str,
    difficulty: Difficulty,
    num_questions: usize,
    rng: &mut impl rand::Rng,
) -> Option<Vec<Question>> {
    let arr = raw.get("questions").and_then(|a| a.as_array())?;

    let mut questions: Vec<Question> = arr
        .iter()
        .filter_map(|v| coerce_question(v, subject, difficulty, rng))
        .take(num_questions)
        .collect();

    let mut seen = HashSet::new();
    let ids_usable = questions
        .iter()
        .all(|q| !q.id.trim().is_empty() && seen.insert(q.id.clone()));
    if !ids_usable {
        for (idx, q) in questions.iter_mut().enumerate() {
            q.id = format!("q{}", idx + 1);
        }
    }

    Some(questions)
}

fn coerce_question(
    v: &JsonValue,
    subject: &str,
    default_difficulty: Difficulty,
    rng: &mut impl rand::Rng,
) -> Option<Question> {
    let question_text = text(v.get("question"))?;

    let mut options: Vec<String> = v
        .get("options")
        .and_then(|o| o.as_array())
        .map(|a| a.iter().filter_map(|x| text(Some(x))).collect())
        .unwrap_or_default();

    let question_type = match v.get("type").and_then(|t| t.as_str()) {
        Some(t) => t.parse::<QuestionType>().ok()?,
        None if !options.is_empty() => QuestionType::MultipleChoice,
        None => QuestionType::ShortAnswer,
    };

    let raw_answer = v.get("correct_answer")?;
    let mut correct_answer = match raw_answer {
        JsonValue::Number(n) if question_type == QuestionType::MultipleChoice => {
            let idx = n.as_u64()? as usize;
            options.get(idx)?.clone()
        }
        other => text(Some(other))?,
    };

    match question_type {
        QuestionType::MultipleChoice => {
            if options.len() < 2 {
                return None;
            }
            if !options.contains(&correct_answer) {
                correct_answer = option_for_letter(&correct_answer, &options)?;
            }
            options.shuffle(rng);
        }
        QuestionType::TrueFalse => {
            correct_answer = match correct_answer.trim().to_ascii_lowercase().as_str() {
                "true" | "t" => "True".to_string(),
                "false" | "f" => "False".to_string(),
                _ => return None,
            };
            options.clear();
        }
        QuestionType::ShortAnswer | QuestionType::Coding => options.clear(),
    }

    Some(Question {
        id: text(v.get("id")).unwrap_or_default(),
        question_type,
        difficulty: v
            .get("difficulty")
            .and_then(|d| d.as_str())
            .and_then(|d| d.parse().ok())
            .unwrap_or(default_difficulty),
        topic: text(v.get("topic")).unwrap_or_else(|| subject.to_string()),
        subtopic: text(v.get("subtopic")).unwrap_or_default(),
        question: question_text,
        options,
        correct_answer,
        explanation: text(v.get("explanation")).unwrap_or_default(),
        code_snippet: text(v.get("code_snippet")).filter(|_| question_type == QuestionType::Coding),
    })
}

/// Maps answers like "B", "b)" or "C." onto the option at that position.
fn option_for_letter(answer: &str, options: &[String]) -> Option<String> {
    let trimmed = answer.trim().trim_end_matches([')', '.', ':']);
    let mut chars = trimmed.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !letter.is_ascii_uppercase() {
        return None;
    }
    let idx = (letter as u8 - b'A') as usize;
    options.get(idx).cloned()
}

/// Non-empty text from a string, number or bool.
fn text(value: Option<&JsonValue>) -> Option<String> {
    let s = match value? {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm_service::{LlmError, LlmProvider, MockLlmBackend};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn letter_answers_map_to_option_text() {
        let raw = json!({"questions": [{
            "id": "q1", "type": "multiple_choice", "difficulty": "Easy",
            "question": "Which is a list comprehension?",
            "options": ["map()", "[x for x in y]", "lambda", "yield"],
            "correct_answer": "B"
        }]});
        let qs = sanitize_questions(&raw, "Python Programming", Difficulty::Medium, 10, &mut rng()).unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].correct_answer, "[x for x in y]");
        assert!(qs[0].options.contains(&qs[0].correct_answer));
        assert_eq!(qs[0].options.len(), 4);
        assert_eq!(qs[0].difficulty, Difficulty::Easy);
    }

    #[test]
    fn index_answers_map_to_option_text() {
        let raw = json!({"questions": [{
            "type": "multiple_choice", "question": "Pick",
            "options": ["zero", "one", "two"], "correct_answer": 2
        }]});
        let qs = sanitize_questions(&raw, "Data Science", Difficulty::Medium, 10, &mut rng()).unwrap();
        assert_eq!(qs[0].correct_answer, "two");
    }

    #[test]
    fn unusable_questions_are_dropped() {
        let raw = json!({"questions": [
            {"type": "multiple_choice", "question": "One option", "options": ["a"], "correct_answer": "a"},
            {"type": "multiple_choice", "question": "Wrong answer", "options": ["a", "b"], "correct_answer": "z"},
            {"type": "short_answer", "question": "", "correct_answer": "x"},
            {"type": "short_answer", "question": "No answer", "correct_answer": ""},
            {"type": "essay", "question": "Unknown type", "correct_answer": "x"},
            {"type": "true_false", "question": "Maybe?", "correct_answer": "sometimes"},
            {"type": "true_false", "question": "Rust has a GC", "correct_answer": false}
        ]});
        let qs = sanitize_questions(&raw, "Computer Science", Difficulty::Medium, 10, &mut rng()).unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].correct_answer, "False");
        assert_eq!(qs[0].topic, "Computer Science");
    }

    #[test]
    fn duplicate_ids_are_rekeyed_and_list_truncated() {
        let raw = json!({"questions": [
            {"id": "q1", "type": "short_answer", "question": "A", "correct_answer": "a"},
            {"id": "q1", "type": "short_answer", "question": "B", "correct_answer": "b"},
            {"type": "coding", "question": "C", "correct_answer": "c", "code_snippet": "fn main() {}"},
            {"type": "short_answer", "question": "D", "correct_answer": "d"}
        ]});
        let qs = sanitize_questions(&raw, "Software Engineering", Difficulty::Hard, 3, &mut rng()).unwrap();
        let ids: Vec<_> = qs.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
        assert_eq!(qs[2].code_snippet.as_deref(), Some("fn main() {}"));
        assert!(qs.iter().all(|q| q.difficulty == Difficulty::Hard));
    }

    #[test]
    fn missing_question_list_is_none() {
        assert!(sanitize_questions(&json!({"quiz": {}}), "Data Science", Difficulty::Easy, 5, &mut rng()).is_none());
    }

    #[test]
    fn coding_subjects() {
        assert!(subject_includes_coding("Python Programming"));
        assert!(subject_includes_coding("computer science"));
        assert!(!subject_includes_coding("Cloud Computing"));
        assert!(is_known_subject("Operating Systems"));
        assert!(!is_known_subject("Astrology"));
    }

    #[tokio::test]
    async fn generated_quiz_metadata_is_recomputed() {
        let mut mock = MockLlmBackend::new();
        mock.expect_generate().returning(|_, _| {
            Ok(format!(
                "```json\n{}\n```",
                json!({
                    "quiz_metadata": {"subject": "Wrong", "total_questions": 99,
                        "difficulty_distribution": {"Easy": 50, "Medium": 0, "Hard": 0}},
                    "questions": [
                        {"id": "q1", "type": "true_false", "difficulty": "Easy", "question": "Q1", "correct_answer": "True"},
                        {"id": "q2", "type": "short_answer", "difficulty": "Hard", "question": "Q2", "correct_answer": "x"}
                    ]
                })
            ))
        });
        let svc = AIService::new(Arc::new(mock), Duration::from_secs(5));
        let quiz = svc
            .generate_quiz("Data Science", Difficulty::Medium, 25, false)
            .await
            .unwrap();

        assert_eq!(quiz.metadata.subject, "Data Science");
        assert_eq!(quiz.metadata.total_questions, 2);
        assert_eq!(quiz.metadata.difficulty_distribution.easy, 1);
        assert_eq!(quiz.metadata.difficulty_distribution.hard, 1);
        assert_eq!(quiz.metadata.difficulty_distribution.total(), quiz.questions.len());
    }

    #[tokio::test]
    async fn generation_failures_are_typed() {
        let mut failing = MockLlmBackend::new();
        failing
            .expect_generate()
            .returning(|_, _| Err(LlmError::EmptyResponse(LlmProvider::Gemini)));
        let svc = AIService::new(Arc::new(failing), Duration::from_secs(5));
        assert!(matches!(
            svc.generate_quiz("Data Science", Difficulty::Easy, 5, false).await,
            Err(GenerationError::ModelUnavailable(_))
        ));

        let mut garbage = MockLlmBackend::new();
        garbage
            .expect_generate()
            .returning(|_, _| Ok(r#"{"quiz_metadata": {}, "questions": []}"#.to_string()));
        let svc = AIService::new(Arc::new(garbage), Duration::from_secs(5));
        assert!(matches!(
            svc.generate_quiz("Data Science", Difficulty::Easy, 5, false).await,
            Err(GenerationError::MalformedResponse { .. })
        ));
    }
}
