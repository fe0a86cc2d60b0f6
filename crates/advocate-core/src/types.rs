//! Result types shared by every backend.
//!
//! Backends produce these shapes regardless of the wire format they speak.
//! Serialized field names follow the camelCase convention the surrounding
//! application consumes (`whenToUse`, `talkingPoints`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three semantic operations a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Generate questions to ask at an appointment
    Questions,

    /// Generate talking points for self-advocacy
    TalkingPoints,

    /// Analyze a pasted note
    NoteAnalysis,
}

impl Operation {
    /// Stable name used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Questions => "questions",
            Operation::TalkingPoints => "talking-points",
            Operation::NoteAnalysis => "analysis",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionCategory {
    Diagnosis,
    Treatment,
    Testing,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Advocacy,
}

impl QuestionCategory {
    /// All categories, in the order they are presented to backends.
    pub const ALL: [QuestionCategory; 5] = [
        QuestionCategory::Diagnosis,
        QuestionCategory::Treatment,
        QuestionCategory::Testing,
        QuestionCategory::FollowUp,
        QuestionCategory::Advocacy,
    ];

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionCategory::Diagnosis => "Diagnosis",
            QuestionCategory::Treatment => "Treatment",
            QuestionCategory::Testing => "Testing",
            QuestionCategory::FollowUp => "Follow-up",
            QuestionCategory::Advocacy => "Advocacy",
        }
    }

    /// Match a free-form label, ignoring case, spaces, hyphens and underscores.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = normalize_label(label);
        Self::ALL
            .into_iter()
            .find(|c| normalize_label(c.label()) == normalized)
    }
}

impl Default for QuestionCategory {
    fn default() -> Self {
        Self::Advocacy
    }
}

/// How urgently a question should be raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Match a free-form priority, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A question the patient can ask their clinician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub category: QuestionCategory,
    pub priority: Priority,
}

/// Category of a talking point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TalkingPointCategory {
    #[serde(rename = "Symptom Documentation")]
    SymptomDocumentation,
    #[serde(rename = "Preventing Dismissal")]
    PreventingDismissal,
    #[serde(rename = "General Advocacy")]
    GeneralAdvocacy,
    #[serde(rename = "Test Results")]
    TestResults,
}

impl TalkingPointCategory {
    pub const ALL: [TalkingPointCategory; 4] = [
        TalkingPointCategory::SymptomDocumentation,
        TalkingPointCategory::PreventingDismissal,
        TalkingPointCategory::GeneralAdvocacy,
        TalkingPointCategory::TestResults,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TalkingPointCategory::SymptomDocumentation => "Symptom Documentation",
            TalkingPointCategory::PreventingDismissal => "Preventing Dismissal",
            TalkingPointCategory::GeneralAdvocacy => "General Advocacy",
            TalkingPointCategory::TestResults => "Test Results",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = normalize_label(label);
        Self::ALL
            .into_iter()
            .find(|c| normalize_label(c.label()) == normalized)
    }
}

impl Default for TalkingPointCategory {
    fn default() -> Self {
        Self::GeneralAdvocacy
    }
}

/// A statement the patient can use during an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkingPoint {
    pub id: String,

    /// The statement itself
    pub point: String,

    pub category: TalkingPointCategory,

    /// Why the statement helps
    pub context: String,

    /// When to say it
    pub when_to_use: String,
}

/// Structured reading of a free-text note.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteAnalysis {
    /// Potential issues raised by the note
    pub concerns: Vec<String>,

    /// Information the note should contain but does not
    pub missing: Vec<String>,

    /// Actions the patient could take
    pub recommendations: Vec<String>,

    /// Short summary
    pub summary: String,
}

/// Summary used when a backend returns nothing usable.
pub const DEFAULT_SUMMARY: &str = "Analysis completed.";

impl NoteAnalysis {
    /// The structurally valid result returned for unusable backend output.
    pub fn empty() -> Self {
        Self {
            summary: DEFAULT_SUMMARY.to_string(),
            ..Default::default()
        }
    }
}

fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_category_labels() {
        assert_eq!(
            QuestionCategory::from_label("follow up"),
            Some(QuestionCategory::FollowUp)
        );
        assert_eq!(
            QuestionCategory::from_label("FOLLOW-UP"),
            Some(QuestionCategory::FollowUp)
        );
        assert_eq!(QuestionCategory::from_label("testing"), Some(QuestionCategory::Testing));
        assert_eq!(QuestionCategory::from_label("billing"), None);
    }

    #[test]
    fn test_talking_point_category_labels() {
        assert_eq!(
            TalkingPointCategory::from_label("preventing_dismissal"),
            Some(TalkingPointCategory::PreventingDismissal)
        );
        assert_eq!(TalkingPointCategory::from_label(""), None);
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(Priority::from_label(" High "), Some(Priority::High));
        assert_eq!(Priority::from_label("urgent"), None);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_serialized_shape() {
        let point = TalkingPoint {
            id: "tp-0".to_string(),
            point: "I need this documented in my chart.".to_string(),
            category: TalkingPointCategory::GeneralAdvocacy,
            context: "Creates a record".to_string(),
            when_to_use: "After discussing concerns".to_string(),
        };
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["whenToUse"], "After discussing concerns");
        assert_eq!(value["category"], "General Advocacy");

        let question = Question {
            id: "q-0".to_string(),
            text: "What tests do you recommend?".to_string(),
            category: QuestionCategory::FollowUp,
            priority: Priority::High,
        };
        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["category"], "Follow-up");
        assert_eq!(value["priority"], "high");
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Questions.as_str(), "questions");
        assert_eq!(Operation::TalkingPoints.to_string(), "talking-points");
        assert_eq!(Operation::NoteAnalysis.as_str(), "analysis");
    }

    #[test]
    fn test_empty_analysis() {
        let analysis = NoteAnalysis::empty();
        assert!(analysis.concerns.is_empty());
        assert_eq!(analysis.summary, DEFAULT_SUMMARY);
    }
}
