use crate::models::answer::{UserAnswerSet, NO_ANSWER};
use crate::models::question::{estimated_minutes, Difficulty, Quiz, QuestionType};
use crate::services::llm_service::GenerateOptions;
use serde::Serialize;

pub const EVALUATOR_SYSTEM_PROMPT: &str = "You are an expert quiz evaluator. Provide fair, detailed assessments with constructive feedback that helps learners improve.";

pub const GENERATOR_SYSTEM_PROMPT: &str = "You are an expert educational content creator. Generate high-quality quiz questions that test both theoretical knowledge and practical understanding.";

/// What the grader sees for one question.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvaluationPair<'a> {
    pub question_id: &'a str,
    pub question_text: &'a str,
    pub question_type: QuestionType,
    pub correct_answer: &'a str,
    pub user_answer: &'a str,
    pub options: &'a [String],
}

pub fn evaluation_pairs<'a>(quiz: &'a Quiz, answers: &'a UserAnswerSet) -> Vec<EvaluationPair<'a>> {
    quiz.questions
        .iter()
        .map(|q| EvaluationPair {
            question_id: &q.id,
            question_text: &q.question,
            question_type: q.question_type,
            correct_answer: &q.correct_answer,
            user_answer: answers.answer_for(&q.id).unwrap_or(NO_ANSWER),
            options: &q.options,
        })
        .collect()
}

pub fn evaluation_options() -> GenerateOptions {
    GenerateOptions {
        system: Some(EVALUATOR_SYSTEM_PROMPT.to_string()),
        temperature: 0.3,
        max_tokens: 4000,
    }
}

pub fn generation_options() -> GenerateOptions {
    GenerateOptions {
        system: Some(GENERATOR_SYSTEM_PROMPT.to_string()),
        temperature: 0.7,
        max_tokens: 4000,
    }
}

/// Builds the grading request for one submission.
pub fn build_evaluation_prompt(quiz: &Quiz, answers: &UserAnswerSet) -> String {
    let pairs = evaluation_pairs(quiz, answers);
    let pairs_json = serde_json::to_string_pretty(&pairs).unwrap_or_else(|_| "[]".to_string());

    let schema = serde_json::json!({
        "quiz_results": {
            "user_id": answers.user_id,
            "quiz_id": answers.quiz_id,
            "timestamp": "2025-01-01T12:00:00Z",
            "overall_score": {
                "points_earned": 0,
                "total_points": quiz.questions.len(),
                "percentage": 0,
                "grade": "F"
            },
            "performance_by_topic": [],
            "performance_by_difficulty": {
                "Easy": {"correct": 0, "total": 0},
                "Medium": {"correct": 0, "total": 0},
                "Hard": {"correct": 0, "total": 0}
            },
            "question_results": [
                {
                    "question_id": "q1",
                    "user_answer": "user's answer",
                    "correct_answer": "correct answer",
                    "is_correct": true,
                    "points_awarded": 1,
                    "feedback": "Detailed explanation and learning guidance"
                }
            ],
            "recommendations": [
                "Specific study recommendations based on performance"
            ]
        }
    });
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        r#"Evaluate the following quiz answers and provide detailed feedback.

Quiz Context:
- Subject: {subject}
- Total Questions: {total}

Evaluation Pairs:
{pairs_json}

For each question, provide:
1. Correctness assessment (correct / partially correct / incorrect)
2. Points awarded (1 for correct, 0.5 for partially correct, 0 for incorrect). No other values are allowed.
3. Detailed feedback explaining why the answer is right or wrong
4. Learning guidance and tips for improvement

For short_answer and coding questions, judge by semantic equivalence to the correct answer, not exact string match.
Give partial credit to answers that show understanding but miss details.
A user_answer of "{no_answer}" is incorrect.
Finish with overall study recommendations based on the learner's performance.

Return ONLY a valid JSON object with exactly this structure and nothing else:
{schema_json}
"#,
        subject = quiz.metadata.subject,
        total = quiz.questions.len(),
        no_answer = NO_ANSWER,
    )
}

/// Builds the quiz generation request.
pub fn build_generation_prompt(
    subject: &str,
    difficulty: Difficulty,
    num_questions: usize,
    include_coding: bool,
) -> String {
    let coding_instruction = if include_coding {
        "\n- Include 2-3 coding challenges with code snippets to analyze or debug\n- Provide clear problem statements and expected solutions"
    } else {
        ""
    };

    let schema = serde_json::json!({
        "quiz_metadata": {
            "subject": subject,
            "total_questions": num_questions,
            "estimated_time_minutes": estimated_minutes(num_questions),
            "difficulty_distribution": {"Easy": 0, "Medium": 0, "Hard": 0},
            "includes_coding": include_coding
        },
        "questions": [
            {
                "id": "q1",
                "type": "multiple_choice|true_false|short_answer|coding",
                "difficulty": difficulty.as_str(),
                "topic": subject,
                "subtopic": "specific_area",
                "question": "Question text here",
                "options": ["A", "B", "C", "D"],
                "correct_answer": "The full text of the correct option",
                "explanation": "Why this answer is correct",
                "code_snippet": "// For coding questions only"
            }
        ]
    });
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        r#"Generate {num_questions} high-quality quiz questions about {subject} at {difficulty} difficulty level.

Requirements:
- 60% Multiple Choice Questions (4 options each)
- 25% True/False Questions (correct_answer is "True" or "False")
- 15% Short Answer Questions{coding_instruction}

Each question must include:
- Clear, unambiguous question text
- Correct answer (for multiple choice, the exact text of the correct option)
- For multiple choice: 4 plausible options with only one correct
- Brief explanation (1-2 sentences)
- Difficulty level: {difficulty}
- Topic classification

Return ONLY a valid JSON object with this exact structure:
{schema_json}

Make questions challenging but fair for {difficulty} level. Ensure variety in cognitive levels.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Question;

    fn quiz() -> Quiz {
        let q = |id: &str, question_type: QuestionType, options: Vec<&str>, answer: &str| Question {
            id: id.to_string(),
            question_type,
            difficulty: Difficulty::Easy,
            topic: "Ownership".to_string(),
            subtopic: String::new(),
            question: format!("Question {}", id),
            options: options.into_iter().map(String::from).collect(),
            correct_answer: answer.to_string(),
            explanation: String::new(),
            code_snippet: None,
        };
        Quiz::new(
            "Rust Programming",
            vec![
                q("q1", QuestionType::MultipleChoice, vec!["Box", "Rc", "Arc", "Cell"], "Arc"),
                q("q2", QuestionType::TrueFalse, vec![], "True"),
                q("q3", QuestionType::ShortAnswer, vec![], "A value has exactly one owner"),
            ],
        )
    }

    #[test]
    fn missing_answers_become_no_answer_pairs() {
        let quiz = quiz();
        let answers = UserAnswerSet::new("u1", "s1").with_answer("q1", "Arc");
        let pairs = evaluation_pairs(&quiz, &answers);

        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].user_answer, "Arc");
        assert_eq!(pairs[1].user_answer, NO_ANSWER);
        assert_eq!(pairs[2].user_answer, NO_ANSWER);
        assert_eq!(pairs[0].options.len(), 4);
        assert!(pairs[1].options.is_empty());
    }

    #[test]
    fn pairs_follow_quiz_order() {
        let quiz = quiz();
        let answers = UserAnswerSet::new("u1", "s1");
        let ids: Vec<_> = evaluation_pairs(&quiz, &answers)
            .iter()
            .map(|p| p.question_id)
            .collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
    }

    #[test]
    fn prompt_embeds_context_pairs_and_schema() {
        let quiz = quiz();
        let answers = UserAnswerSet::new("learner-7", "s1").with_answer("q2", "False");
        let prompt = build_evaluation_prompt(&quiz, &answers);

        assert!(prompt.contains("Subject: Rust Programming"));
        assert!(prompt.contains("Total Questions: 3"));
        assert!(prompt.contains(r#""question_id": "q3""#));
        assert!(prompt.contains(r#""question_type": "short_answer""#));
        assert!(prompt.contains(r#""user_answer": "No answer provided""#));
        assert!(prompt.contains(r#""user_id": "learner-7""#));
        assert!(prompt.contains("\"quiz_results\""));
        assert!(prompt.contains("semantic equivalence"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let quiz = quiz();
        let answers = UserAnswerSet::new("u1", "s1").with_answer("q1", "Rc");
        assert_eq!(
            build_evaluation_prompt(&quiz, &answers),
            build_evaluation_prompt(&quiz, &answers)
        );
    }

    #[test]
    fn generation_prompt_mentions_coding_only_when_requested() {
        let with = build_generation_prompt("Python Programming", Difficulty::Hard, 10, true);
        let without = build_generation_prompt("Data Science", Difficulty::Easy, 10, false);
        assert!(with.contains("coding challenges"));
        assert!(!without.contains("coding challenges"));
        assert!(with.contains("Generate 10 high-quality quiz questions about Python Programming at Hard"));
    }
}
