//! Cache configuration.
//!
//! Built from the `[cache]` section of the application settings.

use std::time::Duration;

const DEFAULT_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_PATTERN_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LIST_TTL_SECS: u64 = 30 * 60;
const DEFAULT_DETAIL_TTL_SECS: u64 = 60 * 60;
const DEFAULT_NEGATIVE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Master switch; when off every cache call is a miss or no-op.
    pub enabled: bool,
    /// Upper bound for a single backend round trip.
    pub op_timeout: Duration,
    /// Upper bound for a pattern delete. A Redis `SCAN` walks the whole
    /// keyspace, so this is wider than `op_timeout`.
    pub pattern_timeout: Duration,
    pub list_ttl: Duration,
    pub detail_ttl: Duration,
    /// TTL of cached "not found" detail lookups.
    pub negative_ttl: Duration,
    /// Skip the cache for detail-by-slug reads.
    pub freshness_mode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            pattern_timeout: Duration::from_millis(DEFAULT_PATTERN_TIMEOUT_MS),
            list_ttl: Duration::from_secs(DEFAULT_LIST_TTL_SECS),
            detail_ttl: Duration::from_secs(DEFAULT_DETAIL_TTL_SECS),
            negative_ttl: Duration::from_secs(DEFAULT_NEGATIVE_TTL_SECS),
            freshness_mode: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.is_usable(),
            op_timeout: Duration::from_millis(settings.op_timeout_ms.get()),
            pattern_timeout: Duration::from_millis(settings.pattern_timeout_ms.get()),
            list_ttl: Duration::from_secs(settings.list_ttl_seconds.get()),
            detail_ttl: Duration::from_secs(settings.detail_ttl_seconds.get()),
            negative_ttl: Duration::from_secs(settings.negative_ttl_seconds.get()),
            freshness_mode: settings.freshness_mode,
        }
    }
}

impl CacheConfig {
    /// Settings with the cache switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
