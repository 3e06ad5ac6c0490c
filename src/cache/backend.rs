//! Cache backends.
//!
//! A backend moves opaque strings; serialization, timeouts and the fail-open
//! policy live in [`super::CacheStore`].

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use lru::LruCache;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cache transport error: {0}")]
    Transport(String),
    #[error("invalid cache key pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
    #[error("cache `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
}

impl BackendError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError>;

    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Delete every key matching a glob pattern, returning how many went.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process LRU backend with per-entry expiry.
pub struct MemoryBackend {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live (unexpired) keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.lock("keys")
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, MemoryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    backend = "memory",
                    result = "poisoned_recovered",
                    "Recovered from poisoned cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN))
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<GlobMatcher, BackendError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|err| BackendError::Pattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut entries = self.lock("get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lock("set").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.lock("delete").pop(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, BackendError> {
        let matcher = compile_pattern(pattern)?;
        let mut entries = self.lock("delete_pattern");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| matcher.is_match(key.as_str()))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
