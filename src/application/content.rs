//! Cache-aware content service, one instance per resource kind.
//!
//! Reads go cache first and fall back to the soft-delete facade; writes go to
//! the facade and then invalidate. Cache trouble never fails a call.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::query::{self, Audience, ComposeError, ListParams};
use crate::application::repos::{Criteria, DeletedAt, ListPage, RecordStore, RepoError};
use crate::application::soft_delete::SoftDeleteRepository;
use crate::cache::{self, CacheConfig, CacheStore, InvalidationCoordinator, keys};
use crate::domain::kinds::{ContentRecord, ResourceIdentity, ResourceKind};
use crate::domain::slug::{SlugError, UniqueSlugError, unique_slug};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ResourceKind, id: Uuid },
    #[error("{kind} do not support {operation}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Domain(#[from] crate::domain::error::DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<UniqueSlugError<RepoError>> for ContentError {
    fn from(err: UniqueSlugError<RepoError>) -> Self {
        match err {
            UniqueSlugError::Slug(err) => ContentError::Slug(err),
            UniqueSlugError::Lookup(err) => ContentError::Repo(err),
        }
    }
}

pub struct ContentService<R: ContentRecord> {
    repo: SoftDeleteRepository<R>,
    cache: CacheStore,
    invalidation: InvalidationCoordinator,
    config: CacheConfig,
}

impl<R: ContentRecord> Clone for ContentService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            cache: self.cache.clone(),
            invalidation: self.invalidation.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: ContentRecord> ContentService<R> {
    pub fn new(store: Arc<dyn RecordStore<R>>, cache: CacheStore, config: CacheConfig) -> Self {
        Self {
            repo: SoftDeleteRepository::new(store),
            invalidation: InvalidationCoordinator::new(cache.clone()),
            cache,
            config,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        R::KIND
    }

    #[instrument(skip(self), fields(kind = %R::KIND))]
    pub async fn get_by_id(&self, id: Uuid, audience: Audience) -> Result<Option<R>, ContentError> {
        let key = keys::id_key(R::KIND, id);
        let record = self.read_through(&key, Criteria::by_id(id)).await?;
        Ok(record.filter(|record| visible_to(record, audience)))
    }

    #[instrument(skip(self), fields(kind = %R::KIND))]
    pub async fn get_by_slug(
        &self,
        slug: &str,
        audience: Audience,
    ) -> Result<Option<R>, ContentError> {
        if !R::KIND.has_slug() {
            return Err(ContentError::Unsupported {
                kind: R::KIND,
                operation: "slug lookups",
            });
        }

        let criteria = Criteria::by_slug(slug);
        let record = if self.config.freshness_mode {
            cache::record_bypass(R::KIND.as_str(), "freshness_mode");
            self.repo.find_first(&criteria).await?
        } else {
            let key = keys::slug_key(R::KIND, slug);
            self.read_through(&key, criteria).await?
        };
        Ok(record.filter(|record| visible_to(record, audience)))
    }

    /// Privileged lookup that also returns deleted records. Never cached.
    pub async fn get_including_deleted(&self, id: Uuid) -> Result<Option<R>, ContentError> {
        cache::record_bypass(R::KIND.as_str(), "include_deleted");
        let criteria = Criteria::by_id(id).with_deleted_at(DeletedAt::Any);
        Ok(self.repo.find_first(&criteria).await?)
    }

    #[instrument(skip(self, params), fields(kind = %R::KIND))]
    pub async fn list(
        &self,
        params: &ListParams,
        audience: Audience,
    ) -> Result<ListPage<R>, ContentError> {
        let composed = query::compose(R::KIND, params, audience)?;

        let Some(key) = composed.cache_key else {
            cache::record_bypass(R::KIND.as_str(), "search");
            return Ok(self
                .repo
                .find_many(&composed.criteria, composed.window)
                .await?);
        };

        if let Some(page) = self.cache.get::<ListPage<R>>(&key).await {
            return Ok(page);
        }

        let page = self
            .repo
            .find_many(&composed.criteria, composed.window)
            .await?;
        self.cache.set(&key, &page, self.config.list_ttl).await;
        Ok(page)
    }

    #[instrument(skip(self, draft), fields(kind = %R::KIND))]
    pub async fn create(&self, draft: R::Draft) -> Result<R, ContentError> {
        let record = self.repo.create(draft).await?;
        // A cached "not found" for the new slug must not outlive the insert.
        self.invalidation
            .invalidate(R::KIND, record.id(), None, record.slug())
            .await;
        debug!(id = %record.id(), "Created record");
        Ok(record)
    }

    #[instrument(skip(self, patch), fields(kind = %R::KIND))]
    pub async fn update(&self, id: Uuid, patch: R::Patch) -> Result<R, ContentError> {
        let existing = self
            .repo
            .find_first(&Criteria::by_id(id))
            .await?
            .ok_or(ContentError::NotFound { kind: R::KIND, id })?;

        let updated = self.repo.update(id, patch).await.map_err(|err| match err {
            RepoError::NotFound => ContentError::NotFound { kind: R::KIND, id },
            other => ContentError::Repo(other),
        })?;

        self.invalidation
            .invalidate(R::KIND, id, existing.slug(), updated.slug())
            .await;
        Ok(updated)
    }

    #[instrument(skip(self), fields(kind = %R::KIND))]
    pub async fn delete(&self, id: Uuid) -> Result<ResourceIdentity, ContentError> {
        let removed = self.repo.delete(id).await.map_err(|err| match err {
            RepoError::NotFound => ContentError::NotFound { kind: R::KIND, id },
            other => ContentError::Repo(other),
        })?;
        self.invalidation
            .invalidate_removed(std::slice::from_ref(&removed))
            .await;
        Ok(removed)
    }

    /// Delete every record matching `criteria`. Returns how many went.
    #[instrument(skip(self, criteria), fields(kind = %R::KIND))]
    pub async fn delete_many(&self, criteria: &Criteria) -> Result<u64, ContentError> {
        let removed = self.repo.delete_many(criteria).await?;
        if !removed.is_empty() {
            self.invalidation.invalidate_removed(&removed).await;
        }
        Ok(removed.len() as u64)
    }

    /// Derive a slug from `source` that no live record uses yet.
    pub async fn unique_slug(&self, source: &str) -> Result<String, ContentError> {
        if !R::KIND.has_slug() {
            return Err(ContentError::Unsupported {
                kind: R::KIND,
                operation: "slugs",
            });
        }

        let repo = self.repo.clone();
        let slug = unique_slug(source, move |candidate| {
            let repo = repo.clone();
            async move {
                repo.find_first(&Criteria::by_slug(candidate))
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await?;
        Ok(slug)
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn invalidation(&self) -> &InvalidationCoordinator {
        &self.invalidation
    }

    async fn read_through(&self, key: &str, criteria: Criteria) -> Result<Option<R>, ContentError> {
        if let Some(cached) = self.cache.get::<Option<R>>(key).await {
            return Ok(cached);
        }

        let found = self.repo.find_first(&criteria).await?;
        let ttl = if found.is_some() {
            self.config.detail_ttl
        } else {
            self.config.negative_ttl
        };
        self.cache.set(key, &found, ttl).await;
        Ok(found)
    }
}

/// Public audiences only see records in the kind's public status.
fn visible_to<R: ContentRecord>(record: &R, audience: Audience) -> bool {
    match (audience, R::KIND.public_status()) {
        (Audience::Privileged, _) | (Audience::Public, None) => true,
        (Audience::Public, Some(public)) => record.status() == Some(public),
    }
}
