use crate::models::evaluation::{EvaluationResult, Grade};
use crate::models::session::{QuizSession, SessionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

fn default_limit() -> usize {
    DEFAULT_LEADERBOARD_LIMIT
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProgressAction {
    GetUserProgress {
        user_id: String,
    },
    GetLeaderboard {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    GetSubjectPerformance {
        subject: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProgress {
    pub user_id: String,
    pub quizzes_taken: usize,
    pub average_percentage: f64,
    pub best_grade: Option<Grade>,
    pub subjects_studied: Vec<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub quizzes_taken: usize,
    pub average_percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubjectPerformance {
    pub subject: String,
    pub attempts: usize,
    pub average_percentage: f64,
    pub grade_distribution: BTreeMap<Grade, usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ProgressReport {
    User(UserProgress),
    Leaderboard { leaderboard: Vec<LeaderboardEntry> },
    Subject(SubjectPerformance),
}

/// A completed attempt: the session subject plus its stored result.
struct Attempt<'a> {
    subject: &'a str,
    result: &'a EvaluationResult,
}

fn completed(sessions: &[QuizSession]) -> impl Iterator<Item = Attempt<'_>> {
    sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .filter_map(|s| {
            s.results.as_ref().map(|result| Attempt {
                subject: &s.subject,
                result,
            })
        })
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub struct ProgressService;

impl ProgressService {
    pub fn run(action: &ProgressAction, sessions: &[QuizSession]) -> ProgressReport {
        match action {
            ProgressAction::GetUserProgress { user_id } => ProgressReport::User(Self::user_progress(user_id, sessions)),
            ProgressAction::GetLeaderboard { limit } => ProgressReport::Leaderboard {
                leaderboard: Self::leaderboard(*limit, sessions),
            },
            ProgressAction::GetSubjectPerformance { subject } => {
                ProgressReport::Subject(Self::subject_performance(subject, sessions))
            }
        }
    }

    pub fn user_progress(user_id: &str, sessions: &[QuizSession]) -> UserProgress {
        let attempts: Vec<Attempt> = completed(sessions).filter(|a| a.result.user_id == user_id).collect();

        let average_percentage = average(attempts.iter().map(|a| a.result.overall_score.percentage));
        let mut subjects_studied: Vec<String> = Vec::new();
        for a in &attempts {
            if !subjects_studied.iter().any(|s| s == a.subject) {
                subjects_studied.push(a.subject.to_string());
            }
        }

        let mut recommendations = Vec::new();
        if !attempts.is_empty() {
            if average_percentage < 70.0 {
                recommendations.push("Focus on reviewing fundamentals before attempting harder questions".to_string());
                recommendations.push("Retake quizzes in weak subject areas".to_string());
            } else if average_percentage > 85.0 {
                recommendations.push("Challenge yourself with harder difficulty levels".to_string());
                recommendations.push("Explore advanced topics in your strongest subjects".to_string());
            }
        }

        UserProgress {
            user_id: user_id.to_string(),
            quizzes_taken: attempts.len(),
            average_percentage,
            best_grade: attempts.iter().map(|a| a.result.overall_score.grade).min(),
            subjects_studied,
            last_activity: attempts.iter().map(|a| a.result.timestamp).max(),
            recommendations,
        }
    }

    /// Users ranked by average percentage; ties go to whoever took more quizzes.
    pub fn leaderboard(limit: usize, sessions: &[QuizSession]) -> Vec<LeaderboardEntry> {
        let mut by_user: HashMap<&str, Vec<f64>> = HashMap::new();
        for a in completed(sessions) {
            by_user
                .entry(a.result.user_id.as_str())
                .or_default()
                .push(a.result.overall_score.percentage);
        }

        let mut entries: Vec<LeaderboardEntry> = by_user
            .into_iter()
            .map(|(user_id, scores)| LeaderboardEntry {
                rank: 0,
                user_id: user_id.to_string(),
                quizzes_taken: scores.len(),
                average_percentage: average(scores.into_iter()),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.average_percentage
                .total_cmp(&a.average_percentage)
                .then(b.quizzes_taken.cmp(&a.quizzes_taken))
                .then(a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit);
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.rank = idx + 1;
        }
        entries
    }

    pub fn subject_performance(subject: &str, sessions: &[QuizSession]) -> SubjectPerformance {
        let attempts: Vec<Attempt> = completed(sessions)
            .filter(|a| a.subject.eq_ignore_ascii_case(subject))
            .collect();

        let mut grade_distribution = BTreeMap::new();
        for a in &attempts {
            *grade_distribution.entry(a.result.overall_score.grade).or_insert(0) += 1;
        }

        SubjectPerformance {
            subject: subject.to_string(),
            attempts: attempts.len(),
            average_percentage: average(attempts.iter().map(|a| a.result.overall_score.percentage)),
            grade_distribution,
        }
    }
}
