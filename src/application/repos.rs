//! Repository contract between content services and the relational store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::kinds::{ContentRecord, ResourceIdentity};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Predicate on the deletion marker of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletedAt {
    /// Live rows only.
    IsNull,
    /// Deleted rows only.
    NotNull,
    /// No restriction.
    Any,
}

/// Filter handed to a [`RecordStore`].
///
/// All populated parts are ANDed. `fields` holds kind-specific filters keyed by
/// the names listed in `ResourceKind::filter_names`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub id: Option<Uuid>,
    pub slug: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub search: Option<String>,
    /// `None` means the caller did not say; the soft-delete facade fills it in.
    pub deleted_at: Option<DeletedAt>,
    pub status_in: Vec<String>,
    pub status_not_in: Vec<String>,
}

impl Criteria {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_deleted_at(mut self, deleted_at: DeletedAt) -> Self {
        self.deleted_at = Some(deleted_at);
        self
    }

    /// True when nothing narrows the matched rows.
    pub fn is_unfiltered(&self) -> bool {
        self.id.is_none()
            && self.slug.is_none()
            && self.fields.is_empty()
            && self.search.is_none()
            && self.status_in.is_empty()
            && self.status_not_in.is_empty()
    }
}

/// Offset pagination window. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of a list query, as returned to callers and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<R> {
    pub items: Vec<R>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Relational storage for one content kind.
///
/// Implementations apply `Criteria` literally. Default scoping (hiding deleted
/// rows) is the job of `SoftDeleteRepository`.
#[async_trait]
pub trait RecordStore<R: ContentRecord>: Send + Sync {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<R>, RepoError>;

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<R>, RepoError>;

    async fn create(&self, draft: R::Draft) -> Result<R, RepoError>;

    /// Apply `patch` to the row with `id`. Fails with `NotFound` if absent.
    async fn update(&self, id: Uuid, patch: R::Patch) -> Result<R, RepoError>;

    /// Stamp `deleted_at = at` on every matching row.
    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError>;

    /// Move every matching row into `status`. Only kinds whose deletion is a
    /// status transition support it.
    async fn mark_status(
        &self,
        criteria: &Criteria,
        status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError>;

    /// Physically remove every matching row. Unfiltered criteria are refused.
    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError>;
}
