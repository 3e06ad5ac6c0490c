use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    Criteria, DeletedAt, ListPage, PageWindow, RecordStore, RepoError,
};
use crate::domain::entities::{PostDraft, PostPatch, PostRecord};
use crate::domain::kinds::{ResourceIdentity, ResourceKind};
use crate::domain::types::PostStatus;

use super::PostgresRepositories;
use super::criteria::{self, FilterSql, Table};
use super::util::map_sqlx_error;

const POSTS: Table = Table {
    kind: ResourceKind::Post,
    name: "posts",
    alias: "p",
    select: "SELECT p.id, p.slug, p.title, p.excerpt, p.body, p.status, p.category_id, \
             ARRAY(SELECT pt.tag_id FROM post_tags pt WHERE pt.post_id = p.id ORDER BY pt.tag_id) AS tag_ids, \
             p.published_at, p.created_at, p.updated_at, p.deleted_at \
             FROM posts p",
    order_by: "COALESCE(p.published_at, p.created_at) DESC, p.id DESC",
    slug_column: Some("p.slug"),
    status_text: Some("p.status::text"),
    soft_delete: true,
    search_columns: &["p.title", "p.slug", "p.excerpt"],
    filters: &[
        ("status", FilterSql::Equals("p.status::text")),
        (
            "category",
            FilterSql::Exists(
                "EXISTS (SELECT 1 FROM categories cat WHERE cat.id = p.category_id AND cat.slug =",
            ),
        ),
        (
            "tag",
            FilterSql::Exists(
                "EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.slug =",
            ),
        ),
    ],
};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    slug: String,
    title: String,
    excerpt: String,
    body: String,
    status: PostStatus,
    category_id: Option<Uuid>,
    tag_ids: Vec<Uuid>,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            body: row.body,
            status: row.status,
            category_id: row.category_id,
            tag_ids: row.tag_ids,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

impl PostgresRepositories {
    async fn replace_post_tags(
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if tag_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) \
             SELECT $1, tag_id FROM UNNEST($2::uuid[]) AS tag_id \
             ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn load_post(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let criteria = Criteria::by_id(id).with_deleted_at(DeletedAt::Any);
        criteria::find_first::<PostRow>(self.pool(), &POSTS, &criteria)
            .await?
            .map(PostRecord::from)
            .ok_or(RepoError::NotFound)
    }
}

/// Publishing without an explicit timestamp publishes now.
fn publication_time(
    status: PostStatus,
    requested: Option<OffsetDateTime>,
) -> Option<OffsetDateTime> {
    match (status, requested) {
        (_, Some(at)) => Some(at),
        (PostStatus::Published, None) => Some(OffsetDateTime::now_utc()),
        (_, None) => None,
    }
}

#[async_trait]
impl RecordStore<PostRecord> for PostgresRepositories {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<PostRecord>, RepoError> {
        let row = criteria::find_first::<PostRow>(self.pool(), &POSTS, criteria).await?;
        Ok(row.map(PostRecord::from))
    }

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<PostRecord>, RepoError> {
        let (rows, total) =
            criteria::find_many::<PostRow>(self.pool(), &POSTS, criteria, window).await?;
        Ok(ListPage {
            items: rows.into_iter().map(PostRecord::from).collect(),
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn create(&self, draft: PostDraft) -> Result<PostRecord, RepoError> {
        let id = Uuid::new_v4();
        let published_at = publication_time(draft.status, draft.published_at);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO posts (id, slug, title, excerpt, body, status, category_id, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(&draft.slug)
        .bind(&draft.title)
        .bind(&draft.excerpt)
        .bind(&draft.body)
        .bind(draft.status)
        .bind(draft.category_id)
        .bind(published_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_post_tags(&mut tx, id, &draft.tag_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.load_post(id).await
    }

    async fn update(&self, id: Uuid, patch: PostPatch) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE posts SET updated_at = now()");
        if let Some(slug) = patch.slug {
            qb.push(", slug = ");
            qb.push_bind(slug);
        }
        if let Some(title) = patch.title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(excerpt) = patch.excerpt {
            qb.push(", excerpt = ");
            qb.push_bind(excerpt);
        }
        if let Some(body) = patch.body {
            qb.push(", body = ");
            qb.push_bind(body);
        }
        if let Some(status) = patch.status {
            qb.push(", status = ");
            qb.push_bind(status);
        }
        if let Some(category_id) = patch.category_id {
            qb.push(", category_id = ");
            qb.push_bind(category_id);
        }
        match (patch.published_at, patch.status) {
            (Some(published_at), _) => {
                qb.push(", published_at = ");
                qb.push_bind(published_at);
            }
            (None, Some(PostStatus::Published)) => {
                qb.push(", published_at = COALESCE(published_at, now())");
            }
            (None, _) => {}
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" AND deleted_at IS NULL RETURNING id");

        let updated: Option<Uuid> = qb
            .build_query_scalar()
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if updated.is_none() {
            return Err(RepoError::NotFound);
        }

        if let Some(tag_ids) = patch.tag_ids {
            Self::replace_post_tags(&mut tx, id, &tag_ids).await?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        self.load_post(id).await
    }

    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::mark_deleted(self.pool(), &POSTS, criteria, at).await
    }

    async fn mark_status(
        &self,
        _criteria: &Criteria,
        _status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        Err(criteria::status_delete_unsupported(&POSTS))
    }

    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::delete_where(self.pool(), &POSTS, criteria).await
    }
}
