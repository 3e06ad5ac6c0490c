//! Domain entities mirrored from persistent storage.
//!
//! Records round-trip through the cache as JSON, so timestamps use RFC 3339.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::kinds::{ContentRecord, ResourceKind};
use crate::domain::types::{CommentStatus, PostStatus, ProductStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub status: PostStatus,
    pub category_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct PostDraft {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub status: PostStatus,
    pub category_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub published_at: Option<OffsetDateTime>,
}

/// Partial post update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub status: Option<PostStatus>,
    pub category_id: Option<Option<Uuid>>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub published_at: Option<Option<OffsetDateTime>>,
}

impl ContentRecord for PostRecord {
    type Draft = PostDraft;
    type Patch = PostPatch;

    const KIND: ResourceKind = ResourceKind::Post;

    fn id(&self) -> Uuid {
        self.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.slug)
    }

    fn status(&self) -> Option<&'static str> {
        Some(self.status.as_str())
    }

    fn deleted_at(&self) -> Option<OffsetDateTime> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CategoryDraft {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl ContentRecord for CategoryRecord {
    type Draft = CategoryDraft;
    type Patch = CategoryPatch;

    const KIND: ResourceKind = ResourceKind::Category;

    fn id(&self) -> Uuid {
        self.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct TagDraft {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub slug: Option<String>,
    pub name: Option<String>,
}

impl ContentRecord for TagRecord {
    type Draft = TagDraft;
    type Patch = TagPatch;

    const KIND: ResourceKind = ResourceKind::Tag;

    fn id(&self) -> Uuid {
        self.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub status: ProductStatus,
    pub category_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub status: ProductStatus,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<Option<Uuid>>,
}

impl ContentRecord for ProductRecord {
    type Draft = ProductDraft;
    type Patch = ProductPatch;

    const KIND: ResourceKind = ResourceKind::Product;

    fn id(&self) -> Uuid {
        self.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.slug)
    }

    fn status(&self) -> Option<&'static str> {
        Some(self.status.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_name: String,
    pub author_email: String,
    pub body: String,
    pub status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub post_id: Uuid,
    pub author_name: String,
    pub author_email: String,
    pub body: String,
}

/// Comments are only ever edited by moderation, so the patch carries the
/// target status and an optional body correction.
#[derive(Debug, Clone, Default)]
pub struct CommentPatch {
    pub body: Option<String>,
    pub status: Option<CommentStatus>,
}

impl ContentRecord for CommentRecord {
    type Draft = CommentDraft;
    type Patch = CommentPatch;

    const KIND: ResourceKind = ResourceKind::Comment;

    fn id(&self) -> Uuid {
        self.id
    }

    fn status(&self) -> Option<&'static str> {
        Some(self.status.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn post_record_survives_json_round_trip() {
        let record = PostRecord {
            id: Uuid::nil(),
            slug: "hello".into(),
            title: "Hello".into(),
            excerpt: String::new(),
            body: "body".into(),
            status: PostStatus::Published,
            category_id: None,
            tag_ids: vec![Uuid::nil()],
            published_at: Some(datetime!(2025-01-02 03:04:05 UTC)),
            created_at: datetime!(2025-01-01 00:00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00:00 UTC),
            deleted_at: None,
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["published_at"], "2025-01-02T03:04:05Z");
        assert_eq!(json["status"], "published");

        let decoded: PostRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(decoded, record);
    }

    #[test]
    fn comments_expose_status_but_no_slug() {
        let comment = CommentRecord {
            id: Uuid::nil(),
            post_id: Uuid::nil(),
            author_name: "a".into(),
            author_email: "a@example.com".into(),
            body: "hi".into(),
            status: CommentStatus::Pending,
            created_at: datetime!(2025-01-01 00:00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00:00 UTC),
        };

        assert_eq!(comment.slug(), None);
        assert_eq!(comment.status(), Some("pending"));
        assert_eq!(comment.deleted_at(), None);
    }
}
