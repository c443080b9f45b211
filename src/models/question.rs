use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Coding,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Coding => "coding",
        }
    }

    /// Short-answer and coding questions are graded by meaning rather than exact text.
    pub fn is_free_form(&self) -> bool {
        matches!(self, QuestionType::ShortAnswer | QuestionType::Coding)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "multiple_choice" | "mcq" => Ok(QuestionType::MultipleChoice),
            "true_false" | "boolean" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "coding" | "code" => Ok(QuestionType::Coding),
            other => Err(format!("unknown question type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subtopic: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DifficultyDistribution {
    #[serde(rename = "Easy", default)]
    pub easy: usize,
    #[serde(rename = "Medium", default)]
    pub medium: usize,
    #[serde(rename = "Hard", default)]
    pub hard: usize,
}

impl DifficultyDistribution {
    pub fn from_questions(questions: &[Question]) -> Self {
        let mut dist = Self::default();
        for q in questions {
            match q.difficulty {
                Difficulty::Easy => dist.easy += 1,
                Difficulty::Medium => dist.medium += 1,
                Difficulty::Hard => dist.hard += 1,
            }
        }
        dist
    }

    pub fn total(&self) -> usize {
        self.easy + self.medium + self.hard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizMetadata {
    pub subject: String,
    pub total_questions: usize,
    #[serde(default)]
    pub estimated_time_minutes: f64,
    #[serde(default)]
    pub difficulty_distribution: DifficultyDistribution,
    #[serde(default)]
    pub includes_coding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    /// Session id the quiz was generated under, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "quiz_metadata")]
    pub metadata: QuizMetadata,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn new(subject: impl Into<String>, questions: Vec<Question>) -> Self {
        let mut quiz = Self {
            id: None,
            metadata: QuizMetadata {
                subject: subject.into(),
                total_questions: 0,
                estimated_time_minutes: 0.0,
                difficulty_distribution: DifficultyDistribution::default(),
                includes_coding: false,
            },
            questions,
        };
        quiz.refresh_metadata();
        quiz
    }

    /// Recomputes the derived metadata fields from the question list.
    pub fn refresh_metadata(&mut self) {
        let n = self.questions.len();
        self.metadata.total_questions = n;
        self.metadata.difficulty_distribution = DifficultyDistribution::from_questions(&self.questions);
        self.metadata.includes_coding = self
            .questions
            .iter()
            .any(|q| q.question_type == QuestionType::Coding);
        self.metadata.estimated_time_minutes = estimated_minutes(n);
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn index_by_id(&self) -> HashMap<&str, &Question> {
        self.questions.iter().map(|q| (q.id.as_str(), q)).collect()
    }

    pub fn is_gradable(&self) -> bool {
        !self.questions.is_empty()
    }
}

pub fn estimated_minutes(num_questions: usize) -> f64 {
    (num_questions as f64 * 1.5).max(15.0)
}
