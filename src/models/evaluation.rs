use crate::models::question::Difficulty;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points a single question may earn: incorrect, partial credit, correct.
pub const ALLOWED_POINTS: [f64; 3] = [0.0, 0.5, 1.0];

const POINTS_EPSILON: f64 = 1e-9;

pub fn is_allowed_points(points: f64) -> bool {
    ALLOWED_POINTS
        .iter()
        .any(|allowed| (points - allowed).abs() < POINTS_EPSILON)
}

pub fn is_full_credit(points: f64) -> bool {
    (points - 1.0).abs() < POINTS_EPSILON
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResult {
    pub question_id: String,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub is_correct: bool,
    pub points_awarded: f64,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Inclusive lower bounds, checked from the top.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Grade::A
        } else if percentage >= 80.0 {
            Grade::B
        } else if percentage >= 70.0 {
            Grade::C
        } else if percentage >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverallScore {
    pub points_earned: f64,
    pub total_points: usize,
    pub percentage: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicPerformance {
    pub topic: String,
    pub questions_answered: usize,
    pub correct_answers: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DifficultyStats {
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PerformanceByDifficulty {
    #[serde(rename = "Easy", default)]
    pub easy: DifficultyStats,
    #[serde(rename = "Medium", default)]
    pub medium: DifficultyStats,
    #[serde(rename = "Hard", default)]
    pub hard: DifficultyStats,
}

impl PerformanceByDifficulty {
    pub fn bucket(&self, difficulty: Difficulty) -> &DifficultyStats {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn bucket_mut(&mut self, difficulty: Difficulty) -> &mut DifficultyStats {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }

    pub fn total(&self) -> usize {
        self.easy.total + self.medium.total + self.hard.total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub user_id: String,
    pub quiz_id: String,
    pub timestamp: DateTime<Utc>,
    pub overall_score: OverallScore,
    pub performance_by_topic: Vec<TopicPerformance>,
    pub performance_by_difficulty: PerformanceByDifficulty,
    pub question_results: Vec<QuestionResult>,
    pub recommendations: Vec<String>,
}
