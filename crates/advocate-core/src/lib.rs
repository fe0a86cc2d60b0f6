//! # advocate-core
//!
//! Domain types and response parsing for Advocate.
//!
//! This crate answers two questions for every text-generation backend:
//! - What shape must a result have?
//! - How is raw model output turned into that shape?
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: Nothing here touches the network or the filesystem
//! 2. **Total parsing**: Parsers never fail; unusable output becomes an empty valid result
//! 3. **Stable serialization**: Result types serialize to the field names the
//!    surrounding application consumes
//!
//! ## Example
//!
//! ```rust
//! use advocate_core::{parse_questions, Priority};
//!
//! let raw = "```json\n[{\"text\":\"What tests do you recommend?\",\"priority\":\"high\"}]\n```";
//! let questions = parse_questions(raw);
//!
//! assert_eq!(questions.len(), 1);
//! assert_eq!(questions[0].priority, Priority::High);
//! ```

pub mod parse;
pub mod types;

pub use parse::{
    extract_json, parse_analysis, parse_questions, parse_talking_points, strip_code_fence,
    ParseError,
};
pub use types::{
    NoteAnalysis, Operation, Priority, Question, QuestionCategory, TalkingPoint,
    TalkingPointCategory, DEFAULT_SUMMARY,
};
