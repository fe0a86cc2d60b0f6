//! Resilience patterns for advocate-runtime.
//!
//! This module provides:
//! - Failure classification (rate limit vs transient)
//! - Per-backend availability with cooldowns

mod availability;

pub use availability::{
    AvailabilityPolicy, AvailabilityTracker, BackendSnapshot, BackendStatus, FailureClass,
};
