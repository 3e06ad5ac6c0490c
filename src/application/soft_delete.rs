//! Per-kind repository facade that applies the kind's deletion policy.
//!
//! Every service reads and deletes through [`SoftDeleteRepository`]; the
//! underlying [`RecordStore`] never sees an unscoped default read.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{
    Criteria, DeletedAt, ListPage, PageWindow, RecordStore, RepoError,
};
use crate::domain::kinds::{ContentRecord, DeletionPolicy, ResourceIdentity};

pub struct SoftDeleteRepository<R: ContentRecord> {
    inner: Arc<dyn RecordStore<R>>,
    policy: DeletionPolicy,
}

impl<R: ContentRecord> Clone for SoftDeleteRepository<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            policy: self.policy,
        }
    }
}

impl<R: ContentRecord> SoftDeleteRepository<R> {
    pub fn new(inner: Arc<dyn RecordStore<R>>) -> Self {
        Self {
            inner,
            policy: R::KIND.deletion_policy(),
        }
    }

    pub fn policy(&self) -> DeletionPolicy {
        self.policy
    }

    /// Apply the default deletion scope to a read.
    ///
    /// An explicit `deleted_at` predicate (or, for status-transition kinds, an
    /// explicit status filter) overrides the default.
    pub fn scope(&self, criteria: &Criteria) -> Result<Criteria, RepoError> {
        self.validate(criteria)?;

        let mut scoped = criteria.clone();
        match self.policy {
            DeletionPolicy::Hard => {}
            DeletionPolicy::Timestamp => {
                if scoped.deleted_at.is_none() {
                    scoped.deleted_at = Some(DeletedAt::IsNull);
                }
            }
            DeletionPolicy::StatusTransition { terminal } => {
                let terminal = terminal.iter().map(|status| status.to_string());
                match scoped.deleted_at.take() {
                    Some(DeletedAt::Any) => {}
                    Some(DeletedAt::NotNull) => scoped.status_in.extend(terminal),
                    Some(DeletedAt::IsNull) => scoped.status_not_in.extend(terminal),
                    None if scoped.fields.contains_key("status") => {}
                    None => scoped.status_not_in.extend(terminal),
                }
            }
        }
        Ok(scoped)
    }

    pub async fn find_first(&self, criteria: &Criteria) -> Result<Option<R>, RepoError> {
        let scoped = self.scope(criteria)?;
        self.inner.find_first(&scoped).await
    }

    pub async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<R>, RepoError> {
        let scoped = self.scope(criteria)?;
        self.inner.find_many(&scoped, window).await
    }

    pub async fn create(&self, draft: R::Draft) -> Result<R, RepoError> {
        self.inner.create(draft).await
    }

    pub async fn update(&self, id: Uuid, patch: R::Patch) -> Result<R, RepoError> {
        self.inner.update(id, patch).await
    }

    /// Delete one live record, returning its identity.
    ///
    /// Timestamp kinds are stamped and status-transition kinds move to their
    /// first terminal status instead of being removed. Deleting a row that is
    /// already marked reports `NotFound`.
    pub async fn delete(&self, id: Uuid) -> Result<ResourceIdentity, RepoError> {
        let criteria = Criteria::by_id(id);
        let mut removed = self.delete_many(&criteria).await?;
        match removed.pop() {
            Some(identity) if removed.is_empty() => Ok(identity),
            Some(_) => Err(RepoError::Integrity {
                message: format!("delete by id `{id}` matched more than one {}", R::KIND),
            }),
            None => Err(RepoError::NotFound),
        }
    }

    /// Delete every record matching `criteria`, keeping the caller's filter.
    pub async fn delete_many(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        self.validate(criteria)?;
        if criteria.is_unfiltered() {
            return Err(RepoError::invalid_input(format!(
                "refusing to delete every {}",
                R::KIND
            )));
        }

        match self.policy {
            DeletionPolicy::Timestamp => {
                let mut scoped = criteria.clone();
                if scoped.deleted_at.is_none() {
                    scoped.deleted_at = Some(DeletedAt::IsNull);
                }
                let now = OffsetDateTime::now_utc();
                debug!(kind = %R::KIND, "rewriting delete into deleted_at stamp");
                self.inner.mark_deleted(&scoped, now).await
            }
            DeletionPolicy::StatusTransition { terminal } => {
                let Some(target) = terminal.first().copied() else {
                    return Err(RepoError::Integrity {
                        message: format!("{} declare no terminal status", R::KIND),
                    });
                };
                // Terminal rows are already deleted and cannot move again.
                let mut scoped = criteria.clone();
                scoped.deleted_at = None;
                scoped
                    .status_not_in
                    .extend(terminal.iter().map(|status| status.to_string()));
                debug!(kind = %R::KIND, status = target, "rewriting delete into status move");
                self.inner.mark_status(&scoped, target).await
            }
            DeletionPolicy::Hard => self.inner.delete_where(criteria).await,
        }
    }

    fn validate(&self, criteria: &Criteria) -> Result<(), RepoError> {
        let allowed = R::KIND.filter_names();
        if let Some(name) = criteria
            .fields
            .keys()
            .find(|name| !allowed.contains(&name.as_str()))
        {
            return Err(RepoError::invalid_input(format!(
                "{} cannot be filtered by `{name}`",
                R::KIND
            )));
        }

        if criteria.slug.is_some() && !R::KIND.has_slug() {
            return Err(RepoError::invalid_input(format!("{} have no slug", R::KIND)));
        }

        if self.policy == DeletionPolicy::Hard && criteria.deleted_at == Some(DeletedAt::NotNull) {
            return Err(RepoError::invalid_input(format!(
                "{} records are removed on delete and carry no deletion marker",
                R::KIND
            )));
        }

        Ok(())
    }
}
