use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{Criteria, ListPage, PageWindow, RecordStore, RepoError};
use crate::domain::entities::{TagDraft, TagPatch, TagRecord};
use crate::domain::kinds::{ResourceIdentity, ResourceKind};

use super::PostgresRepositories;
use super::criteria::{self, Table};
use super::util::map_sqlx_error;

const TAGS: Table = Table {
    kind: ResourceKind::Tag,
    name: "tags",
    alias: "t",
    select: "SELECT t.id, t.slug, t.name, t.created_at, t.updated_at FROM tags t",
    order_by: "t.name ASC, t.id ASC",
    slug_column: Some("t.slug"),
    status_text: None,
    soft_delete: false,
    search_columns: &["t.name", "t.slug"],
    filters: &[],
};

#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    slug: String,
    name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RecordStore<TagRecord> for PostgresRepositories {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<TagRecord>, RepoError> {
        let row = criteria::find_first::<TagRow>(self.pool(), &TAGS, criteria).await?;
        Ok(row.map(TagRecord::from))
    }

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<TagRecord>, RepoError> {
        let (rows, total) =
            criteria::find_many::<TagRow>(self.pool(), &TAGS, criteria, window).await?;
        Ok(ListPage {
            items: rows.into_iter().map(TagRecord::from).collect(),
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn create(&self, draft: TagDraft) -> Result<TagRecord, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            "INSERT INTO tags (id, slug, name) VALUES ($1, $2, $3) \
             RETURNING id, slug, name, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(draft.slug)
        .bind(draft.name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: TagPatch) -> Result<TagRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tags SET updated_at = now()");
        if let Some(slug) = patch.slug {
            qb.push(", slug = ");
            qb.push_bind(slug);
        }
        if let Some(name) = patch.name {
            qb.push(", name = ");
            qb.push_bind(name);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING id, slug, name, created_at, updated_at");

        qb.build_query_as::<TagRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(TagRecord::from)
            .ok_or(RepoError::NotFound)
    }

    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::mark_deleted(self.pool(), &TAGS, criteria, at).await
    }

    async fn mark_status(
        &self,
        _criteria: &Criteria,
        _status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        Err(criteria::status_delete_unsupported(&TAGS))
    }

    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::delete_where(self.pool(), &TAGS, criteria).await
    }
}
