use crate::error::EvaluationError;
use crate::models::evaluation::{is_allowed_points, is_full_credit, QuestionResult};
use serde_json::{Map, Value as JsonValue};

/// Removes a markdown code fence wrapped around model output: a leading
/// "```" with an optional language tag and a trailing "```".
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parses fenced or bare model output into a JSON document.
pub fn parse_json_document(raw: &str) -> Result<JsonValue, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

/// Totals the model claimed. Never used for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReportedScore {
    pub points_earned: Option<f64>,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub question_results: Vec<QuestionResult>,
    pub recommendations: Vec<String>,
    pub reported: ReportedScore,
}

pub fn parse_evaluation_response(raw: &str) -> Result<ParsedEvaluation, EvaluationError> {
    let doc = parse_json_document(raw)
        .map_err(|e| EvaluationError::malformed(format!("response is not valid JSON: {}", e), raw))?;

    let quiz_results = doc
        .get("quiz_results")
        .and_then(|v| v.as_object())
        .ok_or_else(|| EvaluationError::malformed("missing 'quiz_results' object", raw))?;

    let items = quiz_results
        .get("question_results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| EvaluationError::malformed("'quiz_results.question_results' is missing or not a list", raw))?;

    let question_results = items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_question_result(idx, item).map_err(|reason| EvaluationError::malformed(reason, raw)))
        .collect::<Result<Vec<_>, _>>()?;

    let recommendations = quiz_results
        .get("recommendations")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(as_text).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let reported = quiz_results
        .get("overall_score")
        .map(|score| ReportedScore {
            points_earned: score.get("points_earned").and_then(|v| v.as_f64()),
            percentage: score.get("percentage").and_then(|v| v.as_f64()),
        })
        .unwrap_or_default();

    Ok(ParsedEvaluation {
        question_results,
        recommendations,
        reported,
    })
}

fn parse_question_result(idx: usize, item: &JsonValue) -> Result<QuestionResult, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("question_results[{}] is not an object", idx))?;

    let question_id = match obj.get("question_id") {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => return Err(format!("question_results[{}] is missing 'question_id'", idx)),
    };

    let points_awarded = obj
        .get("points_awarded")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| format!("question_results[{}] ({}) is missing numeric 'points_awarded'", idx, question_id))?;

    if !is_allowed_points(points_awarded) {
        return Err(format!(
            "question_results[{}] ({}) awards {} points; expected 0, 0.5 or 1",
            idx, question_id, points_awarded
        ));
    }

    let is_correct = obj
        .get("is_correct")
        .and_then(|v| v.as_bool())
        .unwrap_or_else(|| is_full_credit(points_awarded));

    Ok(QuestionResult {
        question_id,
        user_answer: text_field(obj, "user_answer"),
        correct_answer: text_field(obj, "correct_answer"),
        is_correct,
        points_awarded,
        feedback: text_field(obj, "feedback"),
    })
}

fn text_field(obj: &Map<String, JsonValue>, key: &str) -> String {
    obj.get(key).and_then(as_text).unwrap_or_default()
}

fn as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
