//! Caching layer for advocate-runtime.
//!
//! Identical requests within their time-to-live are answered from memory
//! without touching any backend. Each entry carries its own TTL; moka evicts
//! on that schedule and every read also checks the stored deadline, so an
//! expired entry is never returned.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use advocate_core::{NoteAnalysis, Operation, Question, TalkingPoint};
use moka::future::Cache;
use moka::Expiry;
use tokio::time::Instant;

/// Characters of a note kept verbatim in its cache key.
const NOTE_PREFIX_CHARS: usize = 100;

/// Stand-in deadline for TTLs too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Cache key: the operation plus its ordered argument fingerprints.
///
/// Keys compare part by part, so arguments containing `:` cannot collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Operation,
    parts: Vec<String>,
}

impl CacheKey {
    pub fn questions(symptoms: &str, appointment_type: &str, concerns: &str) -> Self {
        Self {
            operation: Operation::Questions,
            parts: vec![
                symptoms.to_string(),
                appointment_type.to_string(),
                concerns.to_string(),
            ],
        }
    }

    pub fn talking_points(symptoms: &str, concerns: &str) -> Self {
        Self {
            operation: Operation::TalkingPoints,
            parts: vec![symptoms.to_string(), concerns.to_string()],
        }
    }

    /// Notes can be long; the key keeps a prefix, the byte length and a hash.
    pub fn analysis(note: &str) -> Self {
        let prefix: String = note.chars().take(NOTE_PREFIX_CHARS).collect();
        let mut hasher = DefaultHasher::new();
        note.hash(&mut hasher);

        Self {
            operation: Operation::NoteAnalysis,
            parts: vec![
                prefix,
                note.len().to_string(),
                format!("{:016x}", hasher.finish()),
            ],
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation.as_str())?;
        for part in &self.parts {
            write!(f, ":{}", part)?;
        }
        Ok(())
    }
}

/// A cached operation result.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationOutput {
    Questions(Vec<Question>),
    TalkingPoints(Vec<TalkingPoint>),
    Analysis(NoteAnalysis),
}

/// Result types that can be stored in the cache.
pub trait Cacheable: Sized + Clone {
    fn into_output(self) -> OperationOutput;

    /// `None` if the output holds a different operation's result.
    fn from_output(output: OperationOutput) -> Option<Self>;
}

impl Cacheable for Vec<Question> {
    fn into_output(self) -> OperationOutput {
        OperationOutput::Questions(self)
    }

    fn from_output(output: OperationOutput) -> Option<Self> {
        match output {
            OperationOutput::Questions(v) => Some(v),
            _ => None,
        }
    }
}

impl Cacheable for Vec<TalkingPoint> {
    fn into_output(self) -> OperationOutput {
        OperationOutput::TalkingPoints(self)
    }

    fn from_output(output: OperationOutput) -> Option<Self> {
        match output {
            OperationOutput::TalkingPoints(v) => Some(v),
            _ => None,
        }
    }
}

impl Cacheable for NoteAnalysis {
    fn into_output(self) -> OperationOutput {
        OperationOutput::Analysis(self)
    }

    fn from_output(output: OperationOutput) -> Option<Self> {
        match output {
            OperationOutput::Analysis(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: OperationOutput,
    stored_at: Instant,
    expires_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Per-entry expiry for moka.
struct EntryExpiry;

impl Expiry<CacheKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl.min(FAR_FUTURE))
    }
}

/// Response cache using moka.
pub struct ResponseCache {
    cache: Cache<CacheKey, CacheEntry>,
}

impl ResponseCache {
    /// Create a cache holding at most `max_entries` results.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();

        Self { cache }
    }

    /// Get a cached result. Expired entries are invalidated and read as a miss.
    pub async fn get<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.cache.get(key).await?;

        if entry.is_expired(Instant::now()) {
            self.cache.invalidate(key).await;
            return None;
        }

        tracing::trace!(
            key = %key,
            age = ?entry.stored_at.elapsed(),
            "Cache entry found"
        );
        T::from_output(entry.value)
    }

    /// Store a result for `ttl`.
    pub async fn insert<T: Cacheable>(&self, key: CacheKey, value: T, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            value: value.into_output(),
            stored_at: now,
            expires_at: now.checked_add(ttl).unwrap_or(now + FAR_FUTURE),
            ttl,
        };
        self.cache.insert(key, entry).await;
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<_> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.cache.invalidate(key.as_ref()).await;
        }
        self.cache.run_pending_tasks().await;

        expired.len()
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of entries, after applying pending evictions.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}
