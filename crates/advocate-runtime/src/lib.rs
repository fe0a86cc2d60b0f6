//! # advocate-runtime
//!
//! Failover orchestration for Advocate's text-generation backends.
//!
//! Callers ask for questions, talking points or a note analysis and get one
//! uniform result. Which backend served it, and which ones failed along the
//! way, stays inside this crate.
//!
//! ## Pieces
//!
//! - [`Orchestrator`]: discovery, ordering, failover, caching
//! - [`resilience`]: per-backend cooldowns and failure classification
//! - [`cache`]: TTL cache keyed by operation inputs
//! - [`Backend`]: the contract every backend adapter implements
//! - [`providers`]: HTTP transports (feature-gated) and the factory registry
//!
//! ## Example
//!
//! ```rust,ignore
//! use advocate_runtime::{Orchestrator, ProviderRegistry, RuntimeConfig};
//!
//! let config = RuntimeConfig::default().with_env_overrides();
//! let orchestrator = Orchestrator::new(config, ProviderRegistry::with_defaults());
//!
//! let questions = orchestrator
//!     .generate_questions("fatigue", "general", "")
//!     .await?;
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use backend::{Backend, ProviderBackend};
pub use cache::{CacheKey, OperationOutput, ResponseCache};
pub use config::{CacheConfig, ConfigError, RuntimeConfig};
pub use orchestrator::{Orchestrator, OrchestratorStatus, RuntimeError, DEFAULT_PREFERENCE};
pub use providers::{LlmProvider, ProviderError, ProviderFactory, ProviderRegistry};
pub use resilience::{AvailabilityPolicy, AvailabilityTracker, BackendSnapshot, FailureClass};
