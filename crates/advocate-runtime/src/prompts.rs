//! Prompt templates for the three operations.
//!
//! Every backend receives the same prompts. Each asks for a single JSON
//! object so that providers with a JSON response mode can enforce it; the
//! parsers in `advocate-core` also accept bare arrays for models that
//! ignore the instruction.

use advocate_core::{QuestionCategory, TalkingPointCategory};

/// System prompt shared by all operations.
pub const SYSTEM_PROMPT: &str = r#"
You are a patient advocacy assistant. You help patients prepare for medical
appointments and understand their records so they can speak up for
themselves.

You do not diagnose. You do not recommend specific medications or doses.
You write in plain language a patient can say out loud.

Always respond with a single valid JSON object and nothing else.
"#;

/// Build the user prompt for question generation.
pub fn questions_prompt(symptoms: &str, appointment_type: &str, concerns: &str) -> String {
    let categories = QuestionCategory::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Generate 8-10 questions for a patient to ask their doctor.

Context:
- Symptoms: {symptoms}
- Appointment Type: {appointment_type}
- Concerns: {concerns}

Return a JSON object with a "questions" array containing objects with:
- "text": The question
- "category": one of {categories}
- "priority": "high", "medium", or "low"

Example: {{"questions": [{{"text":"What tests do you recommend?","category":"Testing","priority":"high"}}]}}"#,
        symptoms = or_placeholder(symptoms, "Not specified"),
        appointment_type = or_placeholder(appointment_type, "General"),
        concerns = or_placeholder(concerns, "None"),
        categories = categories,
    )
}

/// Build the user prompt for talking-point generation.
pub fn talking_points_prompt(symptoms: &str, concerns: &str) -> String {
    let categories = TalkingPointCategory::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Generate 6-8 talking points a patient can use during an appointment.

Context:
- Symptoms: {symptoms}
- Concerns: {concerns}

Return a JSON object with a "talkingPoints" array containing objects with:
- "point": The statement to use
- "category": one of {categories}
- "context": Why this helps
- "whenToUse": When to say this

Example: {{"talkingPoints": [{{"point":"I need this documented in my chart.","category":"General Advocacy","context":"Creates a record","whenToUse":"After discussing concerns"}}]}}"#,
        symptoms = or_placeholder(symptoms, "Not specified"),
        concerns = or_placeholder(concerns, "None"),
        categories = categories,
    )
}

/// Build the user prompt for note analysis.
pub fn analysis_prompt(note: &str) -> String {
    format!(
        r#"Analyze this medical note and return a JSON object with:
- "concerns": Array of potential issues
- "missing": Array of missing information
- "recommendations": Array of actions to take
- "summary": Brief 2-sentence summary

Note:
{note}"#,
        note = note.trim(),
    )
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder
    } else {
        trimmed
    }
}
