//! Google Gemini `generateContent` provider.
//!
//! Gemini has no system role in `contents`; system messages travel in
//! `systemInstruction` and assistant messages use the `model` role.

use super::{
    factory::ProviderFactory,
    http,
    secrets::{self, ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable overriding the model.
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Gemini API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http::build_client(Duration::from_secs(60))?,
        })
    }

    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            GEMINI_API_KEY_ENV,
            "Gemini API key",
        )?;

        Ok(Self {
            credential,
            base_url: secrets::setting(config, "base_url", "GEMINI_BASE_URL", DEFAULT_BASE_URL),
            client: http::build_client(Duration::from_secs(60))?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

fn text_content(role: Option<&str>, text: String) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part { text: Some(text) }],
    }
}

fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> GenerateRequest {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        match msg.role.as_str() {
            "system" => system.push(msg.content),
            "assistant" => contents.push(text_content(Some("model"), msg.content)),
            _ => contents.push(text_content(Some("user"), msg.content)),
        }
    }

    GenerateRequest {
        contents,
        system_instruction: (!system.is_empty()).then(|| text_content(None, system.join("\n\n"))),
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
            response_mime_type: config.json_response.then_some("application/json"),
        },
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = build_request(messages, config);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, config.model
            ))
            .header("x-goog-api-key", self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::send_error(e, config.timeout))?;

        // Quota errors carry status RESOURCE_EXHAUSTED in the envelope
        let body: GenerateResponse = http::decode(response, |v| {
            let message = v["error"]["message"].as_str()?;
            Some(match v["error"]["status"].as_str() {
                Some(status) => format!("{}: {}", status, message),
                None => message.to_string(),
            })
        })
        .await?;

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = body
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: config.model.clone(),
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for Gemini backends.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "AIza...",                 // Optional, falls back to GEMINI_API_KEY env
///   "model": "gemini-1.5-pro"             // Optional, falls back to GEMINI_MODEL env
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self, config: &JsonValue) -> bool {
        ApiCredential::is_available(config, "api_key", GEMINI_API_KEY_ENV)
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn completion_config(&self, config: &JsonValue) -> CompletionConfig {
        CompletionConfig::for_model(secrets::setting(
            config,
            "model",
            GEMINI_MODEL_ENV,
            DEFAULT_MODEL,
        ))
    }
}
