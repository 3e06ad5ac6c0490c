//! Folio cache layer.
//!
//! Read-through caching for content lookups and lists:
//!
//! - **Backends**: Redis in deployments, an in-process LRU for local runs and
//!   tests. Both sit behind [`CacheBackend`].
//! - **Store**: [`CacheStore`] wraps a backend with timeouts, a versioned JSON
//!   envelope and a fail-open error policy.
//! - **Invalidation**: [`InvalidationCoordinator`] runs after every committed
//!   write.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! redis_url = "redis://127.0.0.1:6379"
//! op_timeout_ms = 250
//! pattern_timeout_ms = 5000
//! list_ttl_seconds = 1800
//! ```

mod backend;
mod config;
mod invalidation;
pub mod keys;
mod redis_backend;
mod store;

pub use backend::{BackendError, CacheBackend, MemoryBackend};
pub use config::CacheConfig;
pub use invalidation::InvalidationCoordinator;
pub use redis_backend::RedisBackend;
pub use store::CacheStore;
pub(crate) use invalidation::METRIC_CACHE_INVALIDATION;
pub(crate) use store::{
    METRIC_CACHE_BYPASS, METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    METRIC_CACHE_OP_MS, record_bypass,
};
