//! Runtime configuration.
//!
//! Configuration comes from an optional YAML file validated against an
//! embedded JSON Schema, overlaid with environment variables. Every field
//! has a default, so an empty file (or no file) is a valid configuration.
//!
//! ```yaml
//! backend_order: [gemini, openai]
//! rate_limit_cooldown: 1h
//! backends:
//!   openai:
//!     model: gpt-4o-mini
//! cache:
//!   analysis_ttl: 2h
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::resilience::AvailabilityPolicy;

/// Longest accepted cooldown, timeout or TTL.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Environment variable holding a comma-separated backend preference list.
pub const PROVIDER_ORDER_ENV: &str = "AI_PROVIDER_ORDER";

const CONFIG_SCHEMA_JSON: &str = include_str!("../schema/runtime-config.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Serde adapter for human-readable durations ("30s", "5m", "1h 30m").
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Cache sizing and lifetimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,

    #[serde(with = "humantime_duration")]
    pub questions_ttl: Duration,

    #[serde(with = "humantime_duration")]
    pub talking_points_ttl: Duration,

    #[serde(with = "humantime_duration")]
    pub analysis_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            questions_ttl: Duration::from_secs(60 * 60),
            talking_points_ttl: Duration::from_secs(60 * 60),
            analysis_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Per-backend settings (`api_key`, `model`, `base_url`), keyed by backend name.
    pub backends: BTreeMap<String, JsonValue>,

    /// Explicit preference order. Overrides the built-in default.
    pub backend_order: Option<Vec<String>>,

    /// Failures below this count keep a backend eligible.
    pub retry_threshold: u32,

    #[serde(with = "humantime_duration")]
    pub rate_limit_cooldown: Duration,

    #[serde(with = "humantime_duration")]
    pub transient_cooldown: Duration,

    /// Upper bound on a single backend call.
    #[serde(with = "humantime_duration")]
    pub backend_timeout: Duration,

    pub cache: CacheConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let policy = AvailabilityPolicy::default();
        Self {
            backends: BTreeMap::new(),
            backend_order: None,
            retry_threshold: policy.retry_threshold,
            rate_limit_cooldown: policy.rate_limit_cooldown,
            transient_cooldown: policy.transient_cooldown,
            backend_timeout: Duration::from_secs(30),
            cache: CacheConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let value = match raw {
            serde_yaml::Value::Null => JsonValue::Object(Default::default()),
            other => serde_json::to_value(other).map_err(|e| ConfigError::Invalid(e.to_string()))?,
        };

        validate_schema(&value)?;

        let config: RuntimeConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Apply environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(order) = std::env::var(PROVIDER_ORDER_ENV) {
            self.set_order_from_list(&order);
        }
        self
    }

    /// Replace the preference order from a comma-separated list.
    ///
    /// An empty list leaves the current order untouched.
    pub fn set_order_from_list(&mut self, list: &str) {
        let names: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if !names.is_empty() {
            self.backend_order = Some(names);
        }
    }

    /// Config block for one backend; an empty object if none was given.
    pub fn backend_config(&self, name: &str) -> JsonValue {
        self.backends
            .get(name)
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(Default::default()))
    }

    pub fn availability_policy(&self) -> AvailabilityPolicy {
        AvailabilityPolicy {
            retry_threshold: self.retry_threshold,
            rate_limit_cooldown: self.rate_limit_cooldown,
            transient_cooldown: self.transient_cooldown,
        }
    }

    /// Checks that are awkward to express in the schema.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_threshold == 0 {
            return Err(ConfigError::Invalid(
                "retry_threshold must be at least 1".to_string(),
            ));
        }
        if self.backend_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "backend_timeout must be greater than zero".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }

        let durations = [
            ("rate_limit_cooldown", self.rate_limit_cooldown),
            ("transient_cooldown", self.transient_cooldown),
            ("backend_timeout", self.backend_timeout),
            ("cache.questions_ttl", self.cache.questions_ttl),
            ("cache.talking_points_ttl", self.cache.talking_points_ttl),
            ("cache.analysis_ttl", self.cache.analysis_ttl),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, d)| *d > MAX_DURATION) {
            return Err(ConfigError::Invalid(format!(
                "{} must be at most {}",
                field,
                humantime::format_duration(MAX_DURATION)
            )));
        }
        Ok(())
    }
}

fn get_validator() -> Result<&'static jsonschema::Validator, ConfigError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: JsonValue = serde_json::from_str(CONFIG_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| ConfigError::Invalid(e.clone()))
}

/// Validate a config document against the embedded schema.
fn validate_schema(value: &JsonValue) -> Result<(), ConfigError> {
    let validator = get_validator()?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Schema(errors))
    }
}
