use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{Criteria, ListPage, PageWindow, RecordStore, RepoError};
use crate::domain::entities::{ProductDraft, ProductPatch, ProductRecord};
use crate::domain::kinds::{ResourceIdentity, ResourceKind};
use crate::domain::types::ProductStatus;

use super::PostgresRepositories;
use super::criteria::{self, FilterSql, Table};
use super::util::map_sqlx_error;

const PRODUCT_COLUMNS: &str =
    "id, slug, name, description, price_cents, currency, status, category_id, created_at, updated_at";

const PRODUCTS: Table = Table {
    kind: ResourceKind::Product,
    name: "products",
    alias: "pr",
    select: "SELECT pr.id, pr.slug, pr.name, pr.description, pr.price_cents, pr.currency, \
             pr.status, pr.category_id, pr.created_at, pr.updated_at FROM products pr",
    order_by: "pr.created_at DESC, pr.id DESC",
    slug_column: Some("pr.slug"),
    status_text: Some("pr.status::text"),
    soft_delete: false,
    search_columns: &["pr.name", "pr.slug", "pr.description"],
    filters: &[
        ("status", FilterSql::Equals("pr.status::text")),
        (
            "category",
            FilterSql::Exists(
                "EXISTS (SELECT 1 FROM categories cat WHERE cat.id = pr.category_id AND cat.slug =",
            ),
        ),
    ],
};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    slug: String,
    name: String,
    description: String,
    price_cents: i64,
    currency: String,
    status: ProductStatus,
    category_id: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            currency: row.currency,
            status: row.status,
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RecordStore<ProductRecord> for PostgresRepositories {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<ProductRecord>, RepoError> {
        let row = criteria::find_first::<ProductRow>(self.pool(), &PRODUCTS, criteria).await?;
        Ok(row.map(ProductRecord::from))
    }

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<ProductRecord>, RepoError> {
        let (rows, total) =
            criteria::find_many::<ProductRow>(self.pool(), &PRODUCTS, criteria, window).await?;
        Ok(ListPage {
            items: rows.into_iter().map(ProductRecord::from).collect(),
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn create(&self, draft: ProductDraft) -> Result<ProductRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO products (id, slug, name, description, price_cents, currency, status, category_id) ",
        );
        qb.push_values(std::iter::once(draft), |mut row, draft| {
            row.push_bind(Uuid::new_v4())
                .push_bind(draft.slug)
                .push_bind(draft.name)
                .push_bind(draft.description)
                .push_bind(draft.price_cents)
                .push_bind(draft.currency.to_ascii_uppercase())
                .push_bind(draft.status)
                .push_bind(draft.category_id);
        });
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let row = qb
            .build_query_as::<ProductRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<ProductRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE products SET updated_at = now()");
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
        if let Some(price_cents) = patch.price_cents {
            qb.push(", price_cents = ");
            qb.push_bind(price_cents);
        }
        if let Some(currency) = patch.currency {
            qb.push(", currency = ");
            qb.push_bind(currency.to_ascii_uppercase());
        }
        if let Some(status) = patch.status {
            qb.push(", status = ");
            qb.push_bind(status);
        }
        if let Some(category_id) = patch.category_id {
            qb.push(", category_id = ");
            qb.push_bind(category_id);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        qb.build_query_as::<ProductRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(ProductRecord::from)
            .ok_or(RepoError::NotFound)
    }

    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::mark_deleted(self.pool(), &PRODUCTS, criteria, at).await
    }

    async fn mark_status(
        &self,
        _criteria: &Criteria,
        _status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        Err(criteria::status_delete_unsupported(&PRODUCTS))
    }

    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        criteria::delete_where(self.pool(), &PRODUCTS, criteria).await
    }
}
