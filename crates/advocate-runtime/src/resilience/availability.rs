//! Per-backend availability tracking.
//!
//! Every failure puts the backend into a cooldown whose length depends on
//! how it failed. Cooldowns expire lazily: the next eligibility check after
//! the deadline resets the backend to healthy. There is no background timer.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;
use tokio::time::Instant;

use crate::providers::ProviderError;

/// Stand-in deadline for cooldowns too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

lazy_static! {
    static ref RATE_LIMIT_TEXT: Regex =
        Regex::new(r"(?i)rate[\s_-]?limit|quota|429|resource[\s_]?exhausted|too many requests")
            .unwrap();
}

/// How a backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Quota or rate limit hit; long cooldown.
    RateLimited,

    /// Anything else: network, timeout, server fault, auth.
    Transient,
}

impl FailureClass {
    /// Classify a provider error by status code and message text.
    pub fn classify(error: &ProviderError) -> Self {
        if matches!(error, ProviderError::RateLimited { .. }) || error.status_code() == Some(429) {
            return FailureClass::RateLimited;
        }

        if RATE_LIMIT_TEXT.is_match(&error.to_string()) {
            FailureClass::RateLimited
        } else {
            FailureClass::Transient
        }
    }
}

/// Thresholds and cooldown windows.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityPolicy {
    /// Failures below this count keep an unavailable backend eligible.
    pub retry_threshold: u32,

    pub rate_limit_cooldown: Duration,

    pub transient_cooldown: Duration,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            retry_threshold: 3,
            rate_limit_cooldown: Duration::from_secs(60 * 60),
            transient_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

impl AvailabilityPolicy {
    pub fn cooldown_for(&self, class: FailureClass) -> Duration {
        match class {
            FailureClass::RateLimited => self.rate_limit_cooldown,
            FailureClass::Transient => self.transient_cooldown,
        }
    }
}

/// Health record for one backend.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    pub name: String,
    pub available: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<Instant>,
    pub last_failure_class: Option<FailureClass>,
}

impl BackendStatus {
    /// A backend that has never failed.
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            consecutive_failures: 0,
            last_error: None,
            last_error_at: None,
            cooldown_until: None,
            last_failure_class: None,
        }
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now >= until)
    }

    fn is_eligible(&self, now: Instant, retry_threshold: u32) -> bool {
        !self.in_cooldown(now) && (self.available || self.consecutive_failures < retry_threshold)
    }

    fn snapshot(&self, now: Instant, retry_threshold: u32) -> BackendSnapshot {
        let cooldown_until = self.cooldown_until.and_then(|until| {
            let wall_now = Utc::now();
            if until >= now {
                chrono::Duration::from_std(until - now)
                    .ok()
                    .and_then(|d| wall_now.checked_add_signed(d))
            } else {
                chrono::Duration::from_std(now - until)
                    .ok()
                    .and_then(|d| wall_now.checked_sub_signed(d))
            }
        });

        BackendSnapshot {
            name: self.name.clone(),
            available: self.available,
            eligible: self.is_eligible(now, retry_threshold) || self.cooldown_elapsed(now),
            consecutive_failures: self.consecutive_failures,
            last_error: self.last_error.clone(),
            last_error_at: self.last_error_at,
            cooldown_until,
            last_failure_class: self.last_failure_class,
        }
    }
}

/// Read-only view of a [`BackendStatus`] with wall-clock times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSnapshot {
    pub name: String,
    pub available: bool,
    /// Whether the next call would consider this backend.
    pub eligible: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_failure_class: Option<FailureClass>,
}

/// Tracks availability for a fixed set of backends.
pub struct AvailabilityTracker {
    states: RwLock<HashMap<String, BackendStatus>>,
    policy: AvailabilityPolicy,
}

impl AvailabilityTracker {
    pub fn new(policy: AvailabilityPolicy) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Seed a healthy status for a backend. Existing records are kept.
    pub fn register(&self, name: &str) {
        self.states
            .write()
            .entry(name.to_string())
            .or_insert_with(|| BackendStatus::healthy(name));
    }

    /// Filter `order` down to the backends a call may try, preserving order.
    ///
    /// Backends whose cooldown has passed are reset to healthy here.
    pub fn eligible(&self, order: &[String]) -> Vec<String> {
        let now = Instant::now();
        let mut states = self.states.write();

        order
            .iter()
            .filter(|name| match states.get_mut(name.as_str()) {
                Some(status) => {
                    if status.cooldown_elapsed(now) {
                        tracing::info!(
                            backend = %name,
                            failures = status.consecutive_failures,
                            "Cooldown elapsed, backend available again"
                        );
                        *status = BackendStatus::healthy(name.as_str());
                    }
                    status.is_eligible(now, self.policy.retry_threshold)
                }
                None => false,
            })
            .cloned()
            .collect()
    }

    /// Record a successful call. Resets the backend fully.
    pub fn record_success(&self, name: &str) {
        let mut states = self.states.write();
        if let Some(status) = states.get_mut(name) {
            if status.consecutive_failures > 0 || !status.available {
                tracing::info!(
                    backend = %name,
                    failures = status.consecutive_failures,
                    "Backend recovered"
                );
            }
            *status = BackendStatus::healthy(name);
        }
    }

    /// Record a failed call and start its cooldown.
    ///
    /// Unregistered names are classified but not tracked.
    pub fn record_failure(&self, name: &str, error: &ProviderError) -> FailureClass {
        let class = FailureClass::classify(error);
        let cooldown = self.policy.cooldown_for(class);

        let mut states = self.states.write();
        let Some(status) = states.get_mut(name) else {
            tracing::debug!(backend = %name, "Ignoring failure for unregistered backend");
            return class;
        };

        let now = Instant::now();
        status.available = false;
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = Some(error.to_string());
        status.last_error_at = Some(Utc::now());
        status.cooldown_until = Some(now.checked_add(cooldown).unwrap_or(now + FAR_FUTURE));
        status.last_failure_class = Some(class);

        tracing::warn!(
            backend = %name,
            error = %error,
            class = ?class,
            failures = status.consecutive_failures,
            cooldown = ?cooldown,
            "Backend call failed"
        );

        class
    }

    /// Current status of one backend.
    pub fn status(&self, name: &str) -> Option<BackendStatus> {
        self.states.read().get(name).cloned()
    }

    /// Snapshot every backend in `order`. Never mutates.
    pub fn snapshot(&self, order: &[String]) -> Vec<BackendSnapshot> {
        let now = Instant::now();
        let states = self.states.read();
        order
            .iter()
            .filter_map(|name| states.get(name))
            .map(|status| status.snapshot(now, self.policy.retry_threshold))
            .collect()
    }
}

impl Default for AvailabilityTracker {
    fn default() -> Self {
        Self::new(AvailabilityPolicy::default())
    }
}
