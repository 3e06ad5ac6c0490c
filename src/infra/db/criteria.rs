//! Translation of repository `Criteria` into SQL, shared by every table.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{Criteria, DeletedAt, PageWindow, RepoError};
use crate::domain::kinds::{ResourceIdentity, ResourceKind};

use super::util::{convert_count, map_sqlx_error};

/// How a named list filter is expressed in SQL.
pub(crate) enum FilterSql {
    /// `<expr> = $n`
    Equals(&'static str),
    /// `<prefix> $n)`; the prefix opens an `EXISTS (` subquery.
    Exists(&'static str),
}

/// Static description of one content table.
pub(crate) struct Table {
    pub kind: ResourceKind,
    pub name: &'static str,
    pub alias: &'static str,
    /// `SELECT ... FROM <name> <alias>` producing the kind's row type.
    pub select: &'static str,
    pub order_by: &'static str,
    pub slug_column: Option<&'static str>,
    /// Status as text, for `status_in` / `status_not_in`.
    pub status_text: Option<&'static str>,
    pub soft_delete: bool,
    pub search_columns: &'static [&'static str],
    pub filters: &'static [(&'static str, FilterSql)],
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    slug: Option<String>,
}

impl Table {
    fn identity(&self, row: IdentityRow) -> ResourceIdentity {
        ResourceIdentity {
            kind: self.kind,
            id: row.id,
            slug: row.slug,
        }
    }

    fn returning(&self) -> String {
        match self.slug_column {
            Some(column) => format!(" RETURNING {}.id, {column} AS slug", self.alias),
            None => format!(" RETURNING {}.id, NULL::text AS slug", self.alias),
        }
    }
}

/// Append `WHERE ...` for `criteria`.
pub(crate) fn push_criteria(
    qb: &mut QueryBuilder<'_, Postgres>,
    table: &Table,
    criteria: &Criteria,
) -> Result<(), RepoError> {
    let alias = table.alias;
    qb.push(" WHERE TRUE");

    if let Some(id) = criteria.id {
        qb.push(format!(" AND {alias}.id = "));
        qb.push_bind(id);
    }

    if let Some(slug) = criteria.slug.as_ref() {
        let column = table.slug_column.ok_or_else(|| {
            RepoError::invalid_input(format!("{} have no slug column", table.kind))
        })?;
        qb.push(format!(" AND {column} = "));
        qb.push_bind(slug.clone());
    }

    for (name, value) in &criteria.fields {
        let filter = table
            .filters
            .iter()
            .find(|(filter_name, _)| filter_name == name)
            .map(|(_, filter)| filter)
            .ok_or_else(|| {
                RepoError::invalid_input(format!("{} cannot be filtered by `{name}`", table.kind))
            })?;
        match filter {
            FilterSql::Equals(expr) => {
                qb.push(format!(" AND {expr} = "));
                qb.push_bind(value.clone());
            }
            FilterSql::Exists(prefix) => {
                qb.push(format!(" AND {prefix} "));
                qb.push_bind(value.clone());
                qb.push(")");
            }
        }
    }

    if !criteria.status_in.is_empty() || !criteria.status_not_in.is_empty() {
        let status = table.status_text.ok_or_else(|| {
            RepoError::invalid_input(format!("{} have no status column", table.kind))
        })?;
        if !criteria.status_in.is_empty() {
            qb.push(format!(" AND {status} = ANY("));
            qb.push_bind(criteria.status_in.clone());
            qb.push(")");
        }
        if !criteria.status_not_in.is_empty() {
            qb.push(format!(" AND NOT ({status} = ANY("));
            qb.push_bind(criteria.status_not_in.clone());
            qb.push("))");
        }
    }

    match (table.soft_delete, criteria.deleted_at) {
        (true, Some(DeletedAt::IsNull)) => {
            qb.push(format!(" AND {alias}.deleted_at IS NULL"));
        }
        (true, Some(DeletedAt::NotNull)) => {
            qb.push(format!(" AND {alias}.deleted_at IS NOT NULL"));
        }
        (false, Some(DeletedAt::NotNull)) => {
            qb.push(" AND FALSE");
        }
        _ => {}
    }

    if let Some(search) = criteria.search.as_ref()
        && !table.search_columns.is_empty()
    {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (");
        for (index, column) in table.search_columns.iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            qb.push(format!("{column} ILIKE "));
            qb.push_bind(pattern.clone());
        }
        qb.push(")");
    }

    Ok(())
}

pub(crate) async fn find_first<Row>(
    pool: &PgPool,
    table: &Table,
    criteria: &Criteria,
) -> Result<Option<Row>, RepoError>
where
    Row: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut qb = QueryBuilder::<Postgres>::new(table.select);
    push_criteria(&mut qb, table, criteria)?;
    qb.push(format!(" ORDER BY {} LIMIT 1", table.order_by));

    qb.build_query_as::<Row>()
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)
}

pub(crate) async fn find_many<Row>(
    pool: &PgPool,
    table: &Table,
    criteria: &Criteria,
    window: PageWindow,
) -> Result<(Vec<Row>, u64), RepoError>
where
    Row: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut count_qb =
        QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {} {}", table.name, table.alias));
    push_criteria(&mut count_qb, table, criteria)?;
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;

    let limit = i64::from(window.limit);
    let offset = i64::try_from(window.offset())
        .map_err(|_| RepoError::invalid_input("page offset out of range"))?;

    let mut qb = QueryBuilder::<Postgres>::new(table.select);
    push_criteria(&mut qb, table, criteria)?;
    qb.push(format!(" ORDER BY {} LIMIT ", table.order_by));
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb
        .build_query_as::<Row>()
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;

    Ok((rows, convert_count(total)?))
}

pub(crate) async fn mark_deleted(
    pool: &PgPool,
    table: &Table,
    criteria: &Criteria,
    at: OffsetDateTime,
) -> Result<Vec<ResourceIdentity>, RepoError> {
    if !table.soft_delete {
        return Err(RepoError::invalid_input(format!(
            "{} have no deleted_at column",
            table.kind
        )));
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "UPDATE {} AS {} SET deleted_at = ",
        table.name, table.alias
    ));
    qb.push_bind(at);
    qb.push(", updated_at = ");
    qb.push_bind(at);
    push_criteria(&mut qb, table, criteria)?;
    qb.push(table.returning());

    let rows: Vec<IdentityRow> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(rows.into_iter().map(|row| table.identity(row)).collect())
}

pub(crate) fn status_delete_unsupported(table: &Table) -> RepoError {
    RepoError::invalid_input(format!("{} are not deleted by status", table.kind))
}

/// `UPDATE ... SET status = $1::<status_type>` over the matching rows.
pub(crate) async fn mark_status(
    pool: &PgPool,
    table: &Table,
    criteria: &Criteria,
    status_type: &str,
    status: &str,
) -> Result<Vec<ResourceIdentity>, RepoError> {
    if criteria.is_unfiltered() {
        return Err(RepoError::invalid_input(format!(
            "refusing unfiltered status update on {}",
            table.name
        )));
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "UPDATE {} AS {} SET status = ",
        table.name, table.alias
    ));
    qb.push_bind(status.to_string());
    qb.push(format!("::{status_type}, updated_at = now()"));
    push_criteria(&mut qb, table, criteria)?;
    qb.push(table.returning());

    let rows: Vec<IdentityRow> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(rows.into_iter().map(|row| table.identity(row)).collect())
}

pub(crate) async fn delete_where(
    pool: &PgPool,
    table: &Table,
    criteria: &Criteria,
) -> Result<Vec<ResourceIdentity>, RepoError> {
    if criteria.is_unfiltered() {
        return Err(RepoError::invalid_input(format!(
            "refusing unfiltered delete on {}",
            table.name
        )));
    }

    let mut qb =
        QueryBuilder::<Postgres>::new(format!("DELETE FROM {} AS {}", table.name, table.alias));
    push_criteria(&mut qb, table, criteria)?;
    qb.push(table.returning());

    let rows: Vec<IdentityRow> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(rows.into_iter().map(|row| table.identity(row)).collect())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
