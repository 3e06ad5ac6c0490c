//! Fail-open cache client.
//!
//! Every call is bounded by the configured timeout; pattern deletes get their
//! own, wider budget. Transport failures,
//! timeouts and undecodable payloads are logged, counted and then treated as
//! a miss (reads) or a no-op (writes); nothing here returns an error to a
//! content service.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{BackendError, CacheBackend};
use super::config::CacheConfig;

pub(crate) const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "folio_cache_error_total";
pub(crate) const METRIC_CACHE_BYPASS: &str = "folio_cache_bypass_total";
pub(crate) const METRIC_CACHE_OP_MS: &str = "folio_cache_op_ms";

/// Version tag written into every cached value.
const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeOut<'a, T: ?Sized> {
    v: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    v: u32,
    data: serde_json::Value,
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Option<Arc<dyn CacheBackend>>,
    op_timeout: Duration,
    pattern_timeout: Duration,
}

impl CacheStore {
    /// Wrap `backend`; a disabled config yields [`CacheStore::disabled`].
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            backend: Some(backend),
            op_timeout: config.op_timeout,
            pattern_timeout: config.pattern_timeout,
        }
    }

    /// A store where every read misses and every write is dropped.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            op_timeout: Duration::ZERO,
            pattern_timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
            .as_ref()
            .map(|backend| backend.name())
            .unwrap_or("disabled")
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;
        let prefix = key_prefix(key);

        let raw = match self
            .bounded("get", self.op_timeout, backend.get(key))
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "kind" => prefix).increment(1);
                return None;
            }
            Err(err) => {
                self.report("get", key, &err);
                return None;
            }
        };

        match decode(&raw) {
            Some(value) => {
                counter!(METRIC_CACHE_HIT, "kind" => prefix).increment(1);
                Some(value)
            }
            None => {
                debug!(key, "Discarding cache entry with unexpected shape");
                counter!(METRIC_CACHE_MISS, "kind" => prefix).increment(1);
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        let payload = match serde_json::to_string(&EnvelopeOut {
            v: ENVELOPE_VERSION,
            data: value,
        }) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "Skipping cache write for unserializable value");
                return;
            }
        };

        if let Err(err) = self
            .bounded("set", self.op_timeout, backend.set(key, payload, ttl))
            .await
        {
            self.report("set", key, &err);
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Err(err) = self
            .bounded("delete", self.op_timeout, backend.delete(key))
            .await
        {
            self.report("delete", key, &err);
        }
    }

    /// Delete every key matching a glob. Returns the count, 0 on failure.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };
        match self
            .bounded(
                "delete_pattern",
                self.pattern_timeout,
                backend.delete_pattern(pattern),
            )
            .await
        {
            Ok(removed) => removed,
            Err(err) => {
                self.report("delete_pattern", pattern, &err);
                0
            }
        }
    }

    /// Round-trip check for health reporting. Unlike the data calls this
    /// surfaces the failure.
    pub async fn ping(&self) -> Result<(), BackendError> {
        match self.backend.as_ref() {
            Some(backend) => self.bounded("ping", self.op_timeout, backend.ping()).await,
            None => Ok(()),
        }
    }

    async fn bounded<T, F>(
        &self,
        op: &'static str,
        limit: Duration,
        call: F,
    ) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let started_at = Instant::now();
        let result = match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout { op, after: limit }),
        };
        histogram!(METRIC_CACHE_OP_MS, "op" => op)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn report(&self, op: &'static str, key: &str, err: &BackendError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(
            op,
            key,
            backend = self.backend_name(),
            error = %err,
            "Cache call failed; continuing without cache"
        );
    }
}

/// Count a lookup that skipped the cache on purpose.
pub(crate) fn record_bypass(kind: &'static str, reason: &'static str) {
    counter!(METRIC_CACHE_BYPASS, "kind" => kind, "reason" => reason).increment(1);
}

fn decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let envelope: EnvelopeIn = serde_json::from_str(raw).ok()?;
    if envelope.v != ENVELOPE_VERSION {
        return None;
    }
    serde_json::from_value(envelope.data).ok()
}

fn key_prefix(key: &str) -> String {
    key.split(':').next().unwrap_or_default().to_string()
}
