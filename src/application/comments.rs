//! Comment moderation.
//!
//! Comments are never stamped as deleted; removing one moves it into a
//! terminal status, and default reads hide terminal comments.

use tracing::info;
use uuid::Uuid;

use crate::application::content::{ContentError, ContentService};
use crate::application::query::{Audience, ListParams};
use crate::application::repos::ListPage;
use crate::domain::entities::{CommentDraft, CommentPatch, CommentRecord};
use crate::domain::error::DomainError;
use crate::domain::kinds::ResourceKind;
use crate::domain::types::CommentStatus;

const MAX_BODY_CHARS: usize = 10_000;

#[derive(Clone)]
pub struct CommentService {
    content: ContentService<CommentRecord>,
}

impl CommentService {
    pub fn new(content: ContentService<CommentRecord>) -> Self {
        Self { content }
    }

    /// The underlying cache-aware service, for plain reads.
    pub fn content(&self) -> &ContentService<CommentRecord> {
        &self.content
    }

    /// Store a new comment in `pending`.
    pub async fn submit(&self, draft: CommentDraft) -> Result<CommentRecord, ContentError> {
        let draft = CommentDraft {
            author_name: required(draft.author_name, "author_name")?,
            author_email: required(draft.author_email, "author_email")?,
            body: required(draft.body, "body")?,
            post_id: draft.post_id,
        };
        if draft.body.chars().count() > MAX_BODY_CHARS {
            return Err(DomainError::validation(format!(
                "comment body exceeds {MAX_BODY_CHARS} characters"
            ))
            .into());
        }
        self.content.create(draft).await
    }

    pub async fn approve(&self, id: Uuid) -> Result<CommentRecord, ContentError> {
        self.transition(id, CommentStatus::Approved).await
    }

    pub async fn flag(&self, id: Uuid) -> Result<CommentRecord, ContentError> {
        self.transition(id, CommentStatus::Flagged).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<CommentRecord, ContentError> {
        self.transition(id, CommentStatus::Rejected).await
    }

    pub async fn mark_spam(&self, id: Uuid) -> Result<CommentRecord, ContentError> {
        self.transition(id, CommentStatus::Spam).await
    }

    /// Delete as seen by users of the comment API: a move to `rejected`.
    pub async fn remove(&self, id: Uuid) -> Result<CommentRecord, ContentError> {
        self.reject(id).await
    }

    /// Comments under one post, oldest first.
    pub async fn list_for_post(
        &self,
        post_id: Uuid,
        params: ListParams,
        audience: Audience,
    ) -> Result<ListPage<CommentRecord>, ContentError> {
        let params = params.filter("post", post_id.to_string());
        self.content.list(&params, audience).await
    }

    async fn transition(
        &self,
        id: Uuid,
        next: CommentStatus,
    ) -> Result<CommentRecord, ContentError> {
        let current = self
            .content
            .get_including_deleted(id)
            .await?
            .ok_or(ContentError::NotFound {
                kind: ResourceKind::Comment,
                id,
            })?;

        let next = current.status.transition(next)?;
        let updated = self
            .content
            .update(
                id,
                CommentPatch {
                    status: Some(next),
                    ..CommentPatch::default()
                },
            )
            .await?;

        info!(
            comment_id = %id,
            from = %current.status,
            to = %next,
            "Moderated comment"
        );
        Ok(updated)
    }
}

fn required(value: String, field: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
