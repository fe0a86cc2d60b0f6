//! Lenient parsing of backend output.
//!
//! Models return JSON wrapped in markdown fences, wrapped in an object,
//! prefixed with prose, or not at all. These parsers never fail: anything
//! unusable degrades to an empty but structurally valid result, and
//! individual malformed items are dropped without affecting their siblings.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::types::{
    NoteAnalysis, Priority, Question, QuestionCategory, TalkingPoint, TalkingPointCategory,
    DEFAULT_SUMMARY,
};

lazy_static! {
    /// A whole response wrapped in a markdown code fence, optionally tagged `json`.
    static ref CODE_FENCE: Regex = Regex::new(
        r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n?(.*?)\s*```\s*$"
    ).unwrap();
}

/// Keys under which models tend to nest the item array.
const QUESTION_KEYS: &[&str] = &["questions", "items", "data"];
const TALKING_POINT_KEYS: &[&str] = &["talkingPoints", "talking_points", "points", "items", "data"];

/// Why a response could not be read as JSON.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Response contained no JSON value")]
    NoJson,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Extract the first JSON value from a model response.
///
/// Tries the fence-stripped text as a whole, then the span between the first
/// opening bracket and the last matching closing bracket.
pub fn extract_json(text: &str) -> Result<Value, ParseError> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Err(ParseError::NoJson);
    }

    let whole = serde_json::from_str::<Value>(cleaned);
    if let Ok(value) = whole {
        return Ok(value);
    }

    let start = cleaned.find(|c: char| c == '[' || c == '{').ok_or(ParseError::NoJson)?;
    let close = if cleaned[start..].starts_with('[') { ']' } else { '}' };
    let end = cleaned.rfind(close).ok_or(ParseError::NoJson)?;
    if end <= start {
        return Err(ParseError::NoJson);
    }

    Ok(serde_json::from_str(&cleaned[start..=end])?)
}

/// Parse generated questions. Never fails.
pub fn parse_questions(text: &str) -> Vec<Question> {
    items_from(text, QUESTION_KEYS)
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| question_from(i, &item))
        .collect()
}

/// Parse generated talking points. Never fails.
pub fn parse_talking_points(text: &str) -> Vec<TalkingPoint> {
    items_from(text, TALKING_POINT_KEYS)
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| talking_point_from(i, &item))
        .collect()
}

/// Parse a note analysis. Never fails.
pub fn parse_analysis(text: &str) -> NoteAnalysis {
    let value = match extract_json(text) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => {
            tracing::debug!("Analysis response was JSON but not an object");
            return NoteAnalysis::empty();
        }
        Err(e) => {
            tracing::debug!(error = %e, "Analysis response unparseable");
            return NoteAnalysis::empty();
        }
    };

    let summary = value["summary"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SUMMARY)
        .to_string();

    NoteAnalysis {
        concerns: string_list(&value["concerns"]),
        missing: string_list(&value["missing"]),
        recommendations: string_list(&value["recommendations"]),
        summary,
    }
}

fn items_from(text: &str, keys: &[&str]) -> Vec<Value> {
    let value = match extract_json(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Item response unparseable");
            return Vec::new();
        }
    };

    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => keys
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn question_from(index: usize, item: &Value) -> Option<Question> {
    let text = non_empty_str(item, &["text", "question"])?;

    let category = item["category"]
        .as_str()
        .and_then(QuestionCategory::from_label)
        .unwrap_or_default();
    let priority = item["priority"]
        .as_str()
        .and_then(Priority::from_label)
        .unwrap_or_default();

    Some(Question {
        id: id_or(item, "q", index),
        text,
        category,
        priority,
    })
}

fn talking_point_from(index: usize, item: &Value) -> Option<TalkingPoint> {
    let point = non_empty_str(item, &["point", "text"])?;

    let category = item["category"]
        .as_str()
        .and_then(TalkingPointCategory::from_label)
        .unwrap_or_default();

    Some(TalkingPoint {
        id: id_or(item, "tp", index),
        point,
        category,
        context: non_empty_str(item, &["context", "why"]).unwrap_or_default(),
        when_to_use: non_empty_str(item, &["whenToUse", "when_to_use", "when"]).unwrap_or_default(),
    })
}

fn non_empty_str(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item[*k].as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_or(item: &Value, prefix: &str, index: usize) -> String {
    match &item["id"] {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => format!("{}-{}", prefix, index),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fence("  [3]  "), "[3]");
    }

    #[test]
    fn test_parse_questions_bare_array() {
        let text = r#"[{"text":"What tests do you recommend?","category":"Testing","priority":"high"}]"#;
        let questions = parse_questions(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "q-0");
        assert_eq!(questions[0].category, QuestionCategory::Testing);
        assert_eq!(questions[0].priority, Priority::High);
    }

    #[test]
    fn test_parse_questions_fenced_and_wrapped() {
        let text = "```json\n{\"questions\": [\n  {\"text\": \"Could this be thyroid related?\", \"category\": \"Diagnosis\", \"priority\": \"medium\"},\n  {\"text\": \"When should I follow up?\", \"category\": \"Follow-up\", \"priority\": \"low\"}\n]}\n```";
        let questions = parse_questions(text);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].id, "q-1");
        assert_eq!(questions[1].category, QuestionCategory::FollowUp);
        assert_eq!(questions[1].priority, Priority::Low);
    }

    #[test]
    fn test_parse_questions_prose_prefix() {
        let text = "Here are your questions:\n[{\"text\":\"Is this normal?\"}]\nGood luck!";
        let questions = parse_questions(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].category, QuestionCategory::Advocacy);
        assert_eq!(questions[0].priority, Priority::Medium);
    }

    #[test]
    fn test_malformed_items_dropped() {
        let text = r#"[{"text":"Keep me"}, {"category":"Testing"}, 42, {"text":"  "}, {"text":"Me too","id":7}]"#;
        let questions = parse_questions(text);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "q-0");
        assert_eq!(questions[1].id, "7");
    }

    #[test]
    fn test_garbage_yields_empty() {
        assert!(parse_questions("I cannot help with that.").is_empty());
        assert!(parse_talking_points("{not json").is_empty());
        assert!(parse_questions("").is_empty());
        assert!(parse_questions(r#"{"answer": "none"}"#).is_empty());
    }

    #[test]
    fn test_parse_talking_points() {
        let text = r#"{"talkingPoints": [{"point":"I need this documented in my chart.","category":"General Advocacy","context":"Creates a record","whenToUse":"After discussing concerns"}]}"#;
        let points = parse_talking_points(text);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, "tp-0");
        assert_eq!(points[0].category, TalkingPointCategory::GeneralAdvocacy);
        assert_eq!(points[0].when_to_use, "After discussing concerns");
    }

    #[test]
    fn test_parse_analysis() {
        let text = "```json\n{\"concerns\":[\"No follow-up scheduled\"],\"missing\":[\"Dosage\", 3],\"recommendations\":[],\"summary\":\"Short visit.\"}\n```";
        let analysis = parse_analysis(text);

        assert_eq!(analysis.concerns, vec!["No follow-up scheduled"]);
        assert_eq!(analysis.missing, vec!["Dosage"]);
        assert!(analysis.recommendations.is_empty());
        assert_eq!(analysis.summary, "Short visit.");
    }

    #[test]
    fn test_parse_analysis_defaults() {
        assert_eq!(parse_analysis("nonsense"), NoteAnalysis::empty());
        assert_eq!(parse_analysis("[1,2,3]"), NoteAnalysis::empty());

        let partial = parse_analysis(r#"{"concerns":["A"]}"#);
        assert_eq!(partial.concerns, vec!["A"]);
        assert_eq!(partial.summary, DEFAULT_SUMMARY);
    }

    proptest! {
        #[test]
        fn prop_parsers_never_panic(text in ".{0,200}") {
            let _ = parse_questions(&text);
            let _ = parse_talking_points(&text);
            let analysis = parse_analysis(&text);
            prop_assert!(!analysis.summary.is_empty());
        }

        #[test]
        fn prop_question_ids_unique(texts in proptest::collection::vec("[a-z]{1,12}", 0..12)) {
            let items: Vec<Value> = texts
                .iter()
                .map(|t| serde_json::json!({"text": t}))
                .collect();
            let questions = parse_questions(&Value::Array(items).to_string());

            prop_assert_eq!(questions.len(), texts.len());
            let mut ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), texts.len());
        }
    }
}
