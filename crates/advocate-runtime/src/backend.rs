//! The backend capability contract.
//!
//! A [`Backend`] turns one of the three operations into a call against a
//! specific service and hands back the common result shape. The orchestrator
//! only ever talks to this trait.
//!
//! # Contract
//! - Transport failures surface as [`ProviderError`] so the orchestrator can
//!   classify them by message text and status code.
//! - Unusable model output is NOT a failure. It becomes an empty but
//!   structurally valid result.

use std::sync::Arc;

use advocate_core::{
    parse_analysis, parse_questions, parse_talking_points, NoteAnalysis, Question, TalkingPoint,
};
use async_trait::async_trait;

use crate::prompts;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// A text-generation backend able to serve all three operations.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Generate appointment questions.
    async fn generate_questions(
        &self,
        symptoms: &str,
        appointment_type: &str,
        concerns: &str,
    ) -> Result<Vec<Question>, ProviderError>;

    /// Generate talking points.
    async fn generate_talking_points(
        &self,
        symptoms: &str,
        concerns: &str,
    ) -> Result<Vec<TalkingPoint>, ProviderError>;

    /// Analyze a free-text note.
    async fn analyze_note(&self, note: &str) -> Result<NoteAnalysis, ProviderError>;
}

/// The standard adapter: prompts in, chat completion, lenient parse out.
pub struct ProviderBackend {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, ProviderError> {
        let messages = vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT.trim()),
            ChatMessage::user(prompt),
        ];

        let response = self.provider.complete(messages, &self.completion).await?;

        tracing::debug!(
            provider = self.provider.name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Completion received"
        );

        Ok(response.content)
    }
}

impl std::fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("provider", &self.provider.name())
            .field("model", &self.completion.model)
            .finish()
    }
}

#[async_trait]
impl Backend for ProviderBackend {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate_questions(
        &self,
        symptoms: &str,
        appointment_type: &str,
        concerns: &str,
    ) -> Result<Vec<Question>, ProviderError> {
        let text = self
            .complete(prompts::questions_prompt(symptoms, appointment_type, concerns))
            .await?;
        Ok(parse_questions(&text))
    }

    async fn generate_talking_points(
        &self,
        symptoms: &str,
        concerns: &str,
    ) -> Result<Vec<TalkingPoint>, ProviderError> {
        let text = self
            .complete(prompts::talking_points_prompt(symptoms, concerns))
            .await?;
        Ok(parse_talking_points(&text))
    }

    async fn analyze_note(&self, note: &str) -> Result<NoteAnalysis, ProviderError> {
        let text = self.complete(prompts::analysis_prompt(note)).await?;
        Ok(parse_analysis(&text))
    }
}
