use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{Criteria, ListPage, PageWindow, RecordStore, RepoError};
use crate::domain::entities::{CategoryDraft, CategoryPatch, CategoryRecord};
use crate::domain::kinds::{ResourceIdentity, ResourceKind};

use super::PostgresRepositories;
use super::criteria::{self, Table};
use super::util::map_sqlx_error;

const CATEGORIES: Table = Table {
    kind: ResourceKind::Category,
    name: "categories",
    alias: "c",
    select: "SELECT c.id, c.slug, c.name, c.description, c.created_at, c.updated_at \
             FROM categories c",
    order_by: "c.name ASC, c.id ASC",
    slug_column: Some("c.slug"),
    status_text: None,
    soft_delete: false,
    search_columns: &["c.name", "c.slug"],
    filters: &[],
};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    slug: String,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RecordStore<CategoryRecord> for PostgresRepositories {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<CategoryRecord>, RepoError> {
        let row = criteria::find_first::<CategoryRow>(self.pool(), &CATEGORIES, criteria).await?;
        Ok(row.map(CategoryRecord::from))
    }

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<CategoryRecord>, RepoError> {
        let (rows, total) =
            criteria::find_many::<CategoryRow>(self.pool(), &CATEGORIES, criteria, window).await?;
        Ok(ListPage {
            items: rows.into_iter().map(CategoryRecord::from).collect(),
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn create(&self, draft: CategoryDraft) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (id, slug, name, description) VALUES ($1, $2, $3, $4) \
             RETURNING id, slug, name, description, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(draft.slug)
        .bind(draft.name)
        .bind(draft.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: CategoryPatch) -> Result<CategoryRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE categories SET updated_at = now()");
        if let Some(slug) = patch.slug {
            qb.push(", slug = ");
            qb.push_bind(slug);
        }
        if let Some(name) = patch.name {
            qb.push(", name = ");
            qb.push_bind(name);
        }
        if let Some(description) = patch.description {
            qb.push(", description = ");
            qb.push_bind(description);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING id, slug, name, description, created_at, updated_at");

        qb.build_query_as::<CategoryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(CategoryRecord::from)
            .ok_or(RepoError::NotFound)
    }

    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::mark_deleted(self.pool(), &CATEGORIES, criteria, at).await
    }

    async fn mark_status(
        &self,
        _criteria: &Criteria,
        _status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        Err(criteria::status_delete_unsupported(&CATEGORIES))
    }

    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::delete_where(self.pool(), &CATEGORIES, criteria).await
    }
}
