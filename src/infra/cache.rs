//! Cache bootstrap from settings.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{
    BackendError, CacheBackend, CacheConfig, CacheStore, MemoryBackend, RedisBackend,
};
use crate::config::{CacheBackendKind, CacheSettings};

/// Build the cache client described by `settings`.
///
/// A backend that cannot be reached at startup degrades to a disabled store;
/// the service keeps running against the database alone.
pub async fn connect_cache(settings: &CacheSettings) -> (CacheStore, CacheConfig) {
    let config = CacheConfig::from(settings);
    if !config.enabled {
        info!(target: "folio::cache", "cache disabled");
        return (CacheStore::disabled(), config);
    }

    let backend: Arc<dyn CacheBackend> = match (settings.backend, settings.redis_url.as_deref()) {
        (CacheBackendKind::Memory, _) => Arc::new(MemoryBackend::new(settings.memory_capacity)),
        (CacheBackendKind::Redis, Some(url)) => match connect_redis(url, settings).await {
            Ok(backend) => Arc::new(backend),
            Err(err) => {
                warn!(
                    target: "folio::cache",
                    error = %err,
                    "redis unavailable; continuing without cache"
                );
                return (CacheStore::disabled(), CacheConfig { enabled: false, ..config });
            }
        },
        (CacheBackendKind::Redis, None) => return (CacheStore::disabled(), config),
    };

    let store = CacheStore::new(backend, &config);
    info!(
        target: "folio::cache",
        backend = store.backend_name(),
        op_timeout_ms = config.op_timeout.as_millis() as u64,
        "cache ready"
    );
    (store, config)
}

/// `ConnectionManager` retries internally, so startup puts its own bound on
/// the first connection.
async fn connect_redis(url: &str, settings: &CacheSettings) -> Result<RedisBackend, BackendError> {
    let budget = Duration::from_millis(settings.connect_timeout_ms.get());
    match tokio::time::timeout(budget, RedisBackend::connect(url)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            op: "connect",
            after: budget,
        }),
    }
}
