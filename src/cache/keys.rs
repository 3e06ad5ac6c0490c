//! Cache key scheme.
//!
//! Keys are plain strings so they can be matched by glob patterns:
//!
//! - `<kind>:id:<uuid>`
//! - `<kind>:slug:<slug>`
//! - `<kind>:list:<page>:<limit>[:<filterhash>]`
//!
//! The filter hash covers the filter map in sorted name order, so two
//! logically identical list queries always share a key.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::kinds::ResourceKind;

/// Hex characters kept from the SHA-256 digest of a filter set.
const FILTER_HASH_LEN: usize = 16;

/// Join a kind, a key shape and its parameters with `:`.
pub fn build_key(kind: ResourceKind, shape: &str, params: &[&str]) -> String {
    let mut key = format!("{}:{shape}", kind.as_str());
    for param in params {
        key.push(':');
        key.push_str(param);
    }
    key
}

pub fn id_key(kind: ResourceKind, id: Uuid) -> String {
    build_key(kind, "id", &[&id.to_string()])
}

pub fn slug_key(kind: ResourceKind, slug: &str) -> String {
    build_key(kind, "slug", &[slug])
}

pub fn list_key(
    kind: ResourceKind,
    page: u32,
    limit: u32,
    filters: &BTreeMap<String, String>,
) -> String {
    let page = page.to_string();
    let limit = limit.to_string();
    if filters.is_empty() {
        build_key(kind, "list", &[&page, &limit])
    } else {
        let hash = filter_hash(filters);
        build_key(kind, "list", &[&page, &limit, &hash])
    }
}

/// Glob matching every list key of `kind`.
pub fn list_pattern(kind: ResourceKind) -> String {
    build_key(kind, "list", &["*"])
}

/// Globs matching every single-record key of `kind`.
pub fn detail_patterns(kind: ResourceKind) -> [String; 2] {
    [
        build_key(kind, "id", &["*"]),
        build_key(kind, "slug", &["*"]),
    ]
}

/// Glob matching every key of `kind`.
pub fn kind_pattern(kind: ResourceKind) -> String {
    format!("{}:*", kind.as_str())
}

/// Stable digest of a filter set.
///
/// Names and values are length-prefixed so `a=b&c` and `a=b` + `c=` cannot
/// collide.
pub fn filter_hash(filters: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in filters {
        hasher.update((name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..FILTER_HASH_LEN].to_string()
}
