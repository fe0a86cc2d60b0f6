//! Static registry of backend kinds.
//!
//! The registry is a fixed list of factories assembled at startup. Discovery
//! walks it in registration order, asks each factory whether its credentials
//! are present, and builds the backend if so. There is no dynamic loading:
//! a backend kind exists if and only if its factory was registered.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let backend = registry.create_backend("openai", &serde_json::json!({}))?;
//! ```

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{CompletionConfig, LlmProvider, ProviderError};
use crate::backend::{Backend, ProviderBackend};

/// Factory for one backend kind.
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier for this backend kind, e.g. "openai".
    fn provider_type(&self) -> &'static str;

    /// Whether credentials for this backend are present.
    ///
    /// Discovery only calls [`create`](Self::create) when this returns true.
    fn is_configured(&self, config: &JsonValue) -> bool;

    /// Create the transport from the backend's config block.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate configuration without creating a provider.
    fn validate_config(&self, _config: &JsonValue) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Completion settings (model, limits) derived from the config block.
    fn completion_config(&self, _config: &JsonValue) -> CompletionConfig {
        CompletionConfig::default()
    }

    /// Create the full backend adapter.
    ///
    /// The default wraps [`create`](Self::create) in a [`ProviderBackend`].
    fn create_backend(&self, config: &JsonValue) -> Result<Arc<dyn Backend>, ProviderError> {
        self.validate_config(config)?;
        let provider = self.create(config)?;
        Ok(Arc::new(ProviderBackend::new(
            provider,
            self.completion_config(config),
        )))
    }
}

/// Registry of backend factories, in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: Vec<Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory.
    ///
    /// A factory with the same type replaces the earlier one in place.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        match self
            .factories
            .iter_mut()
            .find(|f| f.provider_type() == factory.provider_type())
        {
            Some(slot) => *slot = factory,
            None => self.factories.push(factory),
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.register(factory);
        self
    }

    /// Create a backend by type name.
    pub fn create_backend(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn Backend>, ProviderError> {
        self.get_factory(provider_type)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "Unknown provider type: '{}'. Available: {:?}",
                    provider_type,
                    self.available_types()
                ))
            })?
            .create_backend(config)
    }

    /// Registered factories, in registration order.
    pub fn factories(&self) -> impl Iterator<Item = &Arc<dyn ProviderFactory>> {
        self.factories.iter()
    }

    /// List registered type names.
    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.provider_type()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.get_factory(provider_type).is_some()
    }

    pub fn get_factory(&self, provider_type: &str) -> Option<&Arc<dyn ProviderFactory>> {
        self.factories
            .iter()
            .find(|f| f.provider_type() == provider_type)
    }

    /// Registry with every provider compiled into this build.
    ///
    /// Registration order is the discovery order: OpenAI, Gemini, Anthropic.
    #[allow(unused_mut)]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiProviderFactory));
        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiProviderFactory));
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
