use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{Criteria, ListPage, PageWindow, RecordStore, RepoError};
use crate::domain::entities::{CommentDraft, CommentPatch, CommentRecord};
use crate::domain::kinds::{ResourceIdentity, ResourceKind};
use crate::domain::types::CommentStatus;

use super::PostgresRepositories;
use super::criteria::{self, FilterSql, Table};
use super::util::map_sqlx_error;

const COMMENT_COLUMNS: &str =
    "id, post_id, author_name, author_email, body, status, created_at, updated_at";

const COMMENTS: Table = Table {
    kind: ResourceKind::Comment,
    name: "comments",
    alias: "c",
    select: "SELECT c.id, c.post_id, c.author_name, c.author_email, c.body, c.status, \
             c.created_at, c.updated_at FROM comments c",
    order_by: "c.created_at ASC, c.id ASC",
    slug_column: None,
    status_text: Some("c.status::text"),
    soft_delete: false,
    search_columns: &["c.body", "c.author_name"],
    filters: &[
        ("post", FilterSql::Equals("c.post_id::text")),
        ("status", FilterSql::Equals("c.status::text")),
    ],
};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_name: String,
    author_email: String,
    body: String,
    status: CommentStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_name: row.author_name,
            author_email: row.author_email,
            body: row.body,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RecordStore<CommentRecord> for PostgresRepositories {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<CommentRecord>, RepoError> {
        let row = criteria::find_first::<CommentRow>(self.pool(), &COMMENTS, criteria).await?;
        Ok(row.map(CommentRecord::from))
    }

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<CommentRecord>, RepoError> {
        let (rows, total) =
            criteria::find_many::<CommentRow>(self.pool(), &COMMENTS, criteria, window).await?;
        Ok(ListPage {
            items: rows.into_iter().map(CommentRecord::from).collect(),
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn create(&self, draft: CommentDraft) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments (id, post_id, author_name, author_email, body, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(draft.post_id)
        .bind(draft.author_name)
        .bind(draft.author_email)
        .bind(draft.body)
        .bind(CommentStatus::Pending)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: CommentPatch) -> Result<CommentRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE comments SET updated_at = now()");
        if let Some(body) = patch.body {
            qb.push(", body = ");
            qb.push_bind(body);
        }
        if let Some(status) = patch.status {
            qb.push(", status = ");
            qb.push_bind(status);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(format!(" RETURNING {COMMENT_COLUMNS}"));

        qb.build_query_as::<CommentRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(CommentRecord::from)
            .ok_or(RepoError::NotFound)
    }

    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::mark_deleted(self.pool(), &COMMENTS, criteria, at).await
    }

    async fn mark_status(
        &self,
        criteria: &Criteria,
        status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::mark_status(self.pool(), &COMMENTS, criteria, "comment_status", status).await
    }

    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::delete_where(self.pool(), &COMMENTS, criteria).await
    }
}
