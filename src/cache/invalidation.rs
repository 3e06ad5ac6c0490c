//! Post-write cache invalidation.
//!
//! Runs after the write has committed. Every step is an idempotent delete, so
//! concurrent writers may invalidate the same keys in any order.

use metrics::counter;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::kinds::{ResourceIdentity, ResourceKind};

use super::keys;
use super::store::CacheStore;

pub(crate) const METRIC_CACHE_INVALIDATION: &str = "folio_cache_invalidation_total";

#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: CacheStore,
}

impl InvalidationCoordinator {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Drop everything a mutation of one record can make stale.
    ///
    /// `old_slug` is the slug before the write and `new_slug` the slug after;
    /// both keys go so a rename can neither serve the old name nor a cached
    /// miss for the new one.
    pub async fn invalidate(
        &self,
        kind: ResourceKind,
        id: Uuid,
        old_slug: Option<&str>,
        new_slug: Option<&str>,
    ) {
        self.drop_entries(kind, id, old_slug, new_slug).await;
        self.invalidate_lists(kind).await;
    }

    /// Invalidate a batch of removed records, clearing each list family once.
    ///
    /// Cached records of kinds the database rewrote alongside the removal
    /// (a post whose category was nulled) are dropped as well.
    pub async fn invalidate_removed(&self, removed: &[ResourceIdentity]) {
        let mut kinds: Vec<ResourceKind> = Vec::new();
        for identity in removed {
            let slug = identity.slug.as_deref();
            self.drop_entries(identity.kind, identity.id, slug, None)
                .await;
            if !kinds.contains(&identity.kind) {
                kinds.push(identity.kind);
            }
        }
        for kind in kinds {
            self.invalidate_lists(kind).await;
            for target in kind.rewritten_on_delete() {
                self.invalidate_details(*target, kind).await;
            }
        }
    }

    async fn invalidate_details(&self, kind: ResourceKind, trigger: ResourceKind) {
        let mut removed = 0;
        for pattern in keys::detail_patterns(kind) {
            removed += self.cache.delete_pattern(&pattern).await;
        }
        counter!(
            METRIC_CACHE_INVALIDATION,
            "kind" => kind.as_str(),
            "scope" => "detail"
        )
        .increment(1);
        debug!(kind = %kind, trigger = %trigger, removed, "Invalidated detail cache");
    }

    /// Wholesale-invalidate the list keys of `kind` and of every kind whose
    /// lists filter on it.
    pub async fn invalidate_lists(&self, kind: ResourceKind) {
        for target in std::iter::once(kind).chain(kind.dependents().iter().copied()) {
            let removed = self.cache.delete_pattern(&keys::list_pattern(target)).await;
            counter!(
                METRIC_CACHE_INVALIDATION,
                "kind" => target.as_str(),
                "scope" => "list"
            )
            .increment(1);
            debug!(kind = %target, trigger = %kind, removed, "Invalidated list cache");
        }
    }

    /// Drop every cached key of the given kinds; all kinds when `kinds` is empty.
    pub async fn purge(&self, kinds: &[ResourceKind]) -> u64 {
        let kinds = if kinds.is_empty() {
            &ResourceKind::ALL[..]
        } else {
            kinds
        };

        let mut removed = 0;
        for kind in kinds {
            let count = self.purge_kind(*kind).await;
            info!(kind = %kind, removed = count, "Purged cache");
            removed += count;
        }
        removed
    }

    /// Drop every cached key of `kind`.
    pub async fn purge_kind(&self, kind: ResourceKind) -> u64 {
        let removed = self.cache.delete_pattern(&keys::kind_pattern(kind)).await;
        counter!(
            METRIC_CACHE_INVALIDATION,
            "kind" => kind.as_str(),
            "scope" => "purge"
        )
        .increment(1);
        removed
    }

    async fn drop_entries(
        &self,
        kind: ResourceKind,
        id: Uuid,
        old_slug: Option<&str>,
        new_slug: Option<&str>,
    ) {
        self.cache.delete(&keys::id_key(kind, id)).await;

        if let Some(slug) = old_slug {
            self.cache.delete(&keys::slug_key(kind, slug)).await;
        }
        if let Some(slug) = new_slug.filter(|slug| Some(*slug) != old_slug) {
            self.cache.delete(&keys::slug_key(kind, slug)).await;
        }

        counter!(
            METRIC_CACHE_INVALIDATION,
            "kind" => kind.as_str(),
            "scope" => "entry"
        )
        .increment(1);
    }
}
