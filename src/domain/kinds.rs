//! Resource kinds and the per-kind policies the repository layer dispatches on.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;
use super::types::CommentStatus;

/// Logical resource kinds served by the content repository layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Post,
    Category,
    Tag,
    Product,
    Comment,
}

/// How a kind expresses deletion.
///
/// The generic find/list path asks the policy which predicate to inject; kinds
/// never special-case each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Rows are physically removed.
    Hard,
    /// Deletes stamp `deleted_at`; rows with a stamp are hidden by default.
    Timestamp,
    /// Deletes move the row into the first terminal status. Default reads
    /// hide rows in any terminal status.
    StatusTransition { terminal: &'static [&'static str] },
}

static COMMENT_TERMINAL: [&str; 2] = [
    CommentStatus::TERMINAL[0].as_str(),
    CommentStatus::TERMINAL[1].as_str(),
];

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Post,
        ResourceKind::Category,
        ResourceKind::Tag,
        ResourceKind::Product,
        ResourceKind::Comment,
    ];

    /// Key prefix and wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Post => "posts",
            ResourceKind::Category => "categories",
            ResourceKind::Tag => "tags",
            ResourceKind::Product => "products",
            ResourceKind::Comment => "comments",
        }
    }

    pub fn deletion_policy(self) -> DeletionPolicy {
        match self {
            ResourceKind::Post => DeletionPolicy::Timestamp,
            ResourceKind::Comment => DeletionPolicy::StatusTransition {
                terminal: &COMMENT_TERMINAL,
            },
            ResourceKind::Category | ResourceKind::Tag | ResourceKind::Product => {
                DeletionPolicy::Hard
            }
        }
    }

    /// Status that public audiences are restricted to, if the kind has one.
    pub fn public_status(self) -> Option<&'static str> {
        match self {
            ResourceKind::Post => Some("published"),
            ResourceKind::Product => Some("active"),
            ResourceKind::Comment => Some("approved"),
            ResourceKind::Category | ResourceKind::Tag => None,
        }
    }

    /// Filter names accepted by list queries of this kind.
    pub fn filter_names(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Post => &["category", "status", "tag"],
            ResourceKind::Product => &["category", "status"],
            ResourceKind::Comment => &["post", "status"],
            ResourceKind::Category | ResourceKind::Tag => &[],
        }
    }

    /// Kinds whose list results filter on this kind's identity.
    pub fn dependents(self) -> &'static [ResourceKind] {
        match self {
            ResourceKind::Category => &[ResourceKind::Post, ResourceKind::Product],
            ResourceKind::Tag => &[ResourceKind::Post],
            ResourceKind::Post => &[ResourceKind::Comment],
            ResourceKind::Product | ResourceKind::Comment => &[],
        }
    }

    /// Kinds whose stored rows the database rewrites when a record of this
    /// kind is removed (`ON DELETE SET NULL` / `CASCADE` on link tables).
    pub fn rewritten_on_delete(self) -> &'static [ResourceKind] {
        match self {
            ResourceKind::Category => &[ResourceKind::Post, ResourceKind::Product],
            ResourceKind::Tag => &[ResourceKind::Post],
            ResourceKind::Post | ResourceKind::Product | ResourceKind::Comment => &[],
        }
    }

    pub fn has_slug(self) -> bool {
        !matches!(self, ResourceKind::Comment)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "post" | "posts" => Ok(ResourceKind::Post),
            "category" | "categories" => Ok(ResourceKind::Category),
            "tag" | "tags" => Ok(ResourceKind::Tag),
            "product" | "products" => Ok(ResourceKind::Product),
            "comment" | "comments" => Ok(ResourceKind::Comment),
            _ => Err(DomainError::unknown_kind(value)),
        }
    }
}

/// Identity of one record as far as cache keys are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    pub id: Uuid,
    pub slug: Option<String>,
}

impl ResourceIdentity {
    pub fn of<R: ContentRecord>(record: &R) -> Self {
        Self {
            kind: R::KIND,
            id: record.id(),
            slug: record.slug().map(str::to_owned),
        }
    }
}

/// A persisted row the repository layer knows how to cache and soft delete.
pub trait ContentRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Input for creating a row.
    type Draft: Send + Sync + 'static;
    /// Partial update applied to an existing row.
    type Patch: Send + Sync + 'static;

    const KIND: ResourceKind;

    fn id(&self) -> Uuid;

    fn slug(&self) -> Option<&str> {
        None
    }

    fn status(&self) -> Option<&'static str> {
        None
    }

    fn deleted_at(&self) -> Option<OffsetDateTime> {
        None
    }
}
