//! Failover orchestrator across text-generation backends.
//!
//! The orchestrator owns every configured backend and hides which one
//! answered. For each operation it:
//! - Answers from the cache when an identical request is still fresh
//! - Tries eligible backends one at a time, in preference order
//! - Records each failure with a cooldown and moves on
//! - Returns a single aggregate error when nothing worked
//!
//! Backends are discovered once, lazily, on first use.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use advocate_core::{NoteAnalysis, Question, TalkingPoint};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::backend::Backend;
use crate::cache::{CacheKey, Cacheable, ResponseCache};
use crate::config::{ConfigError, RuntimeConfig};
use crate::providers::{ProviderError, ProviderRegistry};
use crate::resilience::{AvailabilityTracker, BackendSnapshot};

/// Preference order used when none is configured.
pub const DEFAULT_PREFERENCE: [&str; 3] = ["openai", "gemini", "anthropic"];

/// Errors from the runtime orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("All backends are currently unavailable")]
    AllBackendsUnavailable,

    #[error("All {attempts} eligible backend(s) failed, last error: {last_error}")]
    AllBackendsFailed {
        attempts: usize,
        #[source]
        last_error: ProviderError,
    },
}

impl RuntimeError {
    /// Operator guidance for this error.
    pub fn hint(&self) -> &'static str {
        match self {
            RuntimeError::Configuration(_) => {
                "Configure at least one backend: set OPENAI_API_KEY, GEMINI_API_KEY or \
                 ANTHROPIC_API_KEY, or add an api_key under `backends` in the config file."
            }
            RuntimeError::AllBackendsUnavailable => {
                "Every backend is cooling down after rate limits or errors. \
                 Try again in a few minutes."
            }
            RuntimeError::AllBackendsFailed { .. } => {
                "Every eligible backend failed for this request. Check network access, \
                 API quotas and billing, then retry."
            }
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(err: ConfigError) -> Self {
        RuntimeError::Configuration(err.to_string())
    }
}

/// Snapshot of the orchestrator for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub initialized: bool,
    pub order: Vec<String>,
    pub backends: Vec<BackendSnapshot>,
    pub timestamp: DateTime<Utc>,
}

/// Discovered backends. Built in one step so the three never diverge.
struct BackendSet {
    order: Vec<String>,
    adapters: HashMap<String, Arc<dyn Backend>>,
    tracker: AvailabilityTracker,
}

/// Routes operations to the first backend that succeeds.
///
/// Cheap to share: wrap in an `Arc` and call from any task.
pub struct Orchestrator {
    config: RuntimeConfig,
    registry: ProviderRegistry,
    backends: OnceCell<BackendSet>,
    cache: ResponseCache,
}

impl Orchestrator {
    pub fn new(config: RuntimeConfig, registry: ProviderRegistry) -> Self {
        let cache = ResponseCache::new(config.cache.max_entries);
        Self {
            config,
            registry,
            backends: OnceCell::new(),
            cache,
        }
    }

    /// Discover backends now instead of on first use.
    ///
    /// Runs at most once. A failed attempt is not remembered, so a later call
    /// tries again.
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        self.backends().await.map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.backends.initialized()
    }

    async fn backends(&self) -> Result<&BackendSet, RuntimeError> {
        self.backends
            .get_or_try_init(|| async { self.discover() })
            .await
    }

    fn discover(&self) -> Result<BackendSet, RuntimeError> {
        let mut discovered = Vec::new();
        let mut adapters = HashMap::new();

        for factory in self.registry.factories() {
            let name = factory.provider_type();
            let config = self.config.backend_config(name);

            if !factory.is_configured(&config) {
                tracing::debug!(backend = name, "No credentials, skipping backend");
                continue;
            }

            match factory.create_backend(&config) {
                Ok(backend) => {
                    adapters.insert(name.to_string(), backend);
                    discovered.push(name.to_string());
                }
                Err(e) => {
                    tracing::warn!(backend = name, error = %e, "Failed to initialize backend");
                }
            }
        }

        if discovered.is_empty() {
            return Err(RuntimeError::Configuration(format!(
                "No backends configured. Known backends: {}",
                self.registry.available_types().join(", ")
            )));
        }

        let order = resolve_order(&discovered, self.config.backend_order.as_deref());

        let tracker = AvailabilityTracker::new(self.config.availability_policy());
        for name in &order {
            tracker.register(name);
        }

        tracing::info!(
            backends = order.len(),
            order = %order.join(", "),
            "Orchestrator initialized"
        );

        Ok(BackendSet {
            order,
            adapters,
            tracker,
        })
    }

    /// Generate questions to ask at an appointment.
    pub async fn generate_questions(
        &self,
        symptoms: &str,
        appointment_type: &str,
        concerns: &str,
    ) -> Result<Vec<Question>, RuntimeError> {
        self.run(
            CacheKey::questions(symptoms, appointment_type, concerns),
            self.config.cache.questions_ttl,
            |backend: Arc<dyn Backend>| async move {
                backend
                    .generate_questions(symptoms, appointment_type, concerns)
                    .await
            },
        )
        .await
    }

    /// Generate talking points for an appointment.
    pub async fn generate_talking_points(
        &self,
        symptoms: &str,
        concerns: &str,
    ) -> Result<Vec<TalkingPoint>, RuntimeError> {
        self.run(
            CacheKey::talking_points(symptoms, concerns),
            self.config.cache.talking_points_ttl,
            |backend: Arc<dyn Backend>| async move {
                backend.generate_talking_points(symptoms, concerns).await
            },
        )
        .await
    }

    /// Analyze a free-text medical note.
    pub async fn analyze_note(&self, note: &str) -> Result<NoteAnalysis, RuntimeError> {
        self.run(
            CacheKey::analysis(note),
            self.config.cache.analysis_ttl,
            |backend: Arc<dyn Backend>| async move { backend.analyze_note(note).await },
        )
        .await
    }

    /// The shared failover loop behind every operation.
    async fn run<T, F, Fut>(&self, key: CacheKey, ttl: Duration, call: F) -> Result<T, RuntimeError>
    where
        T: Cacheable,
        F: Fn(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let backends = self.backends().await?;
        let operation = key.operation();

        if let Some(hit) = self.cache.get::<T>(&key).await {
            tracing::debug!(operation = %operation, key = %key, "Cache hit");
            return Ok(hit);
        }

        let eligible = backends.tracker.eligible(&backends.order);
        if eligible.is_empty() {
            tracing::warn!(operation = %operation, "No eligible backends");
            return Err(RuntimeError::AllBackendsUnavailable);
        }

        let timeout = self.config.backend_timeout;
        let mut attempts = 0;
        let mut last_error = None;

        for name in eligible {
            let Some(backend) = backends.adapters.get(&name) else {
                continue;
            };
            attempts += 1;
            tracing::debug!(operation = %operation, backend = %name, attempt = attempts, "Calling backend");

            let result = match tokio::time::timeout(timeout, call(Arc::clone(backend))).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };

            match result {
                Ok(value) => {
                    backends.tracker.record_success(&name);
                    self.cache.insert(key, value.clone(), ttl).await;
                    tracing::info!(operation = %operation, backend = %name, "Request served");
                    return Ok(value);
                }
                Err(e) => {
                    backends.tracker.record_failure(&name, &e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last_error) => Err(RuntimeError::AllBackendsFailed {
                attempts,
                last_error,
            }),
            None => Err(RuntimeError::AllBackendsUnavailable),
        }
    }

    /// Read-only view of every backend. Does not trigger initialization.
    pub fn status(&self) -> OrchestratorStatus {
        match self.backends.get() {
            Some(set) => OrchestratorStatus {
                initialized: true,
                order: set.order.clone(),
                backends: set.tracker.snapshot(&set.order),
                timestamp: Utc::now(),
            },
            None => OrchestratorStatus {
                initialized: false,
                order: Vec::new(),
                backends: Vec::new(),
                timestamp: Utc::now(),
            },
        }
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Remove expired cache entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.cache.purge_expired().await
    }

    /// Number of cached results.
    pub async fn cached_entries(&self) -> u64 {
        self.cache.entry_count().await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Compute the backend order.
///
/// Names from `preference` (or [`DEFAULT_PREFERENCE`]) come first, skipping
/// unknown names and repeats; the rest follow in discovery order.
pub fn resolve_order(discovered: &[String], preference: Option<&[String]>) -> Vec<String> {
    let preferred: Vec<&str> = match preference {
        Some(list) => list.iter().map(String::as_str).collect(),
        None => DEFAULT_PREFERENCE.to_vec(),
    };

    let mut order: Vec<String> = Vec::with_capacity(discovered.len());
    for name in preferred {
        if discovered.iter().any(|d| d == name) && !order.iter().any(|o| o == name) {
            order.push(name.to_string());
        }
    }
    for name in discovered {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }
    order
}
