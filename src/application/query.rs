//! List-query composition.
//!
//! Turns caller-supplied list parameters into a canonical [`ListQuerySpec`],
//! the store [`Criteria`] and, when the query is cacheable, its cache key.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::application::repos::{Criteria, DeletedAt, PageWindow};
use crate::cache::keys;
use crate::domain::kinds::ResourceKind;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Filter name that records an `include_deleted` override in the query, so the
/// widened result set never shares a key with the default one.
const DELETED_FILTER: &str = "deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Public,
    Privileged,
}

impl Audience {
    pub fn is_privileged(self) -> bool {
        matches!(self, Audience::Privileged)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub filters: BTreeMap<String, String>,
    pub search: Option<String>,
    pub include_deleted: bool,
}

impl ListParams {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Canonical form of a list query. Filters are kept sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuerySpec {
    pub kind: ResourceKind,
    pub page: u32,
    pub limit: u32,
    pub filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ComposedQuery {
    pub spec: ListQuerySpec,
    pub criteria: Criteria,
    pub window: PageWindow,
    /// `None` when the query must not touch the cache.
    pub cache_key: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("{kind} cannot be filtered by `{name}`")]
    UnknownFilter { kind: ResourceKind, name: String },
    #[error("filter `{name}` needs a value")]
    EmptyFilter { name: String },
    #[error("public callers may only list {kind} with status `{allowed}`")]
    StatusNotAllowed {
        kind: ResourceKind,
        allowed: &'static str,
    },
    #[error("including deleted {kind} requires a privileged caller")]
    DeletedNotAllowed { kind: ResourceKind },
}

/// Build the query for `kind` as seen by `audience`.
pub fn compose(
    kind: ResourceKind,
    params: &ListParams,
    audience: Audience,
) -> Result<ComposedQuery, ComposeError> {
    let page = params.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut filters = BTreeMap::new();
    for (name, value) in &params.filters {
        let value = value.trim();
        if !kind.filter_names().contains(&name.as_str()) {
            return Err(ComposeError::UnknownFilter {
                kind,
                name: name.clone(),
            });
        }
        if value.is_empty() {
            return Err(ComposeError::EmptyFilter { name: name.clone() });
        }
        filters.insert(name.clone(), value.to_string());
    }

    if let Some(allowed) = kind.public_status() {
        let requested = filters.get("status").cloned();
        match (audience, requested.as_deref()) {
            (Audience::Public, Some(status)) if status != allowed => {
                return Err(ComposeError::StatusNotAllowed { kind, allowed });
            }
            (Audience::Public, _) => {
                filters.insert("status".to_string(), allowed.to_string());
            }
            (Audience::Privileged, _) => {}
        }
    }

    let mut criteria = Criteria {
        fields: filters.clone(),
        ..Criteria::default()
    };

    if params.include_deleted {
        if !audience.is_privileged() {
            return Err(ComposeError::DeletedNotAllowed { kind });
        }
        criteria.deleted_at = Some(DeletedAt::Any);
        filters.insert(DELETED_FILTER.to_string(), "any".to_string());
    }

    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty());
    criteria.search = search.map(str::to_owned);

    let cache_key = match search {
        Some(_) => None,
        None => Some(keys::list_key(kind, page, limit, &filters)),
    };

    Ok(ComposedQuery {
        spec: ListQuerySpec {
            kind,
            page,
            limit,
            filters,
        },
        criteria,
        window: PageWindow { page, limit },
        cache_key,
    })
}
