//! Shared fixtures: an instrumented in-memory record store and misbehaving
//! cache backends.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use folio::application::content::ContentService;
use folio::application::repos::{
    Criteria, DeletedAt, ListPage, PageWindow, RecordStore, RepoError,
};
use folio::cache::{BackendError, CacheBackend, CacheConfig, CacheStore, MemoryBackend};
use folio::domain::entities::{
    CategoryDraft, CategoryPatch, CategoryRecord, CommentDraft, CommentPatch, CommentRecord,
    PostDraft, PostPatch, PostRecord,
};
use folio::domain::kinds::{ContentRecord, ResourceIdentity};
use folio::domain::types::{CommentStatus, PostStatus};
use time::OffsetDateTime;
use uuid::Uuid;

/// How a record type behaves inside [`MemoryStore`].
pub trait Fixture: ContentRecord {
    fn build(id: Uuid, draft: Self::Draft, now: OffsetDateTime) -> Self;

    fn apply(&mut self, patch: Self::Patch, now: OffsetDateTime);

    /// Value of a named list filter, as the store compares it.
    fn field(&self, name: &str) -> Option<String>;

    fn search_text(&self) -> String;

    /// Stamp the deletion marker. Only timestamp kinds carry one.
    fn stamp_deleted(&mut self, _at: OffsetDateTime) {}

    /// Move into a named status. Only status-deleted kinds support it.
    fn move_to(&mut self, _status: &str, _at: OffsetDateTime) -> bool {
        false
    }
}

impl Fixture for PostRecord {
    fn build(id: Uuid, draft: PostDraft, now: OffsetDateTime) -> Self {
        let published_at = match (draft.status, draft.published_at) {
            (_, Some(at)) => Some(at),
            (PostStatus::Published, None) => Some(now),
            _ => None,
        };
        PostRecord {
            id,
            slug: draft.slug,
            title: draft.title,
            excerpt: draft.excerpt,
            body: draft.body,
            status: draft.status,
            category_id: draft.category_id,
            tag_ids: draft.tag_ids,
            published_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn apply(&mut self, patch: PostPatch, now: OffsetDateTime) {
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.as_str().to_string()),
            "category" => self.category_id.map(|id| id.to_string()),
            _ => None,
        }
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.title, self.slug, self.excerpt)
    }

    fn stamp_deleted(&mut self, at: OffsetDateTime) {
        self.deleted_at = Some(at);
        self.updated_at = at;
    }
}

impl Fixture for CategoryRecord {
    fn build(id: Uuid, draft: CategoryDraft, now: OffsetDateTime) -> Self {
        CategoryRecord {
            id,
            slug: draft.slug,
            name: draft.name,
            description: draft.description,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, patch: CategoryPatch, now: OffsetDateTime) {
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = now;
    }

    fn field(&self, _name: &str) -> Option<String> {
        None
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.name, self.slug)
    }
}

impl Fixture for CommentRecord {
    fn build(id: Uuid, draft: CommentDraft, now: OffsetDateTime) -> Self {
        CommentRecord {
            id,
            post_id: draft.post_id,
            author_name: draft.author_name,
            author_email: draft.author_email,
            body: draft.body,
            status: CommentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, patch: CommentPatch, now: OffsetDateTime) {
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.as_str().to_string()),
            "post" => Some(self.post_id.to_string()),
            _ => None,
        }
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.body, self.author_name)
    }

    fn move_to(&mut self, status: &str, at: OffsetDateTime) -> bool {
        match status.parse::<CommentStatus>() {
            Ok(status) => {
                self.status = status;
                self.updated_at = at;
                true
            }
            Err(_) => false,
        }
    }
}

/// Record store over a `Vec`, counting every call that reaches it.
pub struct MemoryStore<R> {
    rows: Mutex<Vec<R>>,
    /// Filter value aliases, e.g. a category slug standing for its id.
    aliases: Mutex<HashMap<String, String>>,
    finds: AtomicUsize,
    lists: AtomicUsize,
    writes: AtomicUsize,
}

impl<R: Fixture> MemoryStore<R> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(Vec::new()),
            aliases: Mutex::new(HashMap::new()),
            finds: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    /// Let filter value `alias` match rows whose field equals `target`.
    pub fn alias(&self, alias: &str, target: impl ToString) {
        self.aliases
            .lock()
            .unwrap()
            .insert(alias.to_string(), target.to_string());
    }

    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<R> {
        self.rows.lock().unwrap().clone()
    }

    /// Change a row without going through a service, so no invalidation runs.
    pub fn tamper(&self, id: Uuid, change: impl FnOnce(&mut R)) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id() == id) {
            change(row);
        }
    }

    fn matches(&self, row: &R, criteria: &Criteria) -> bool {
        if criteria.id.is_some_and(|id| id != row.id()) {
            return false;
        }
        if let Some(slug) = criteria.slug.as_deref()
            && row.slug() != Some(slug)
        {
            return false;
        }

        let aliases = self.aliases.lock().unwrap();
        for (name, wanted) in &criteria.fields {
            let actual = row.field(name);
            let resolved = aliases.get(wanted).unwrap_or(wanted);
            if actual.as_deref() != Some(wanted.as_str())
                && actual.as_deref() != Some(resolved.as_str())
            {
                return false;
            }
        }

        if let Some(term) = criteria.search.as_deref()
            && !row
                .search_text()
                .to_lowercase()
                .contains(&term.to_lowercase())
        {
            return false;
        }

        match criteria.deleted_at {
            Some(DeletedAt::IsNull) if row.deleted_at().is_some() => return false,
            Some(DeletedAt::NotNull) if row.deleted_at().is_none() => return false,
            _ => {}
        }

        let status = row.status().unwrap_or_default();
        if !criteria.status_in.is_empty() && !criteria.status_in.iter().any(|s| s == status) {
            return false;
        }
        if criteria.status_not_in.iter().any(|s| s == status) {
            return false;
        }

        true
    }
}

fn identity<R: ContentRecord>(row: &R) -> ResourceIdentity {
    ResourceIdentity::of(row)
}

#[async_trait]
impl<R: Fixture> RecordStore<R> for MemoryStore<R> {
    async fn find_first(&self, criteria: &Criteria) -> Result<Option<R>, RepoError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap().clone();
        Ok(rows.into_iter().find(|row| self.matches(row, criteria)))
    }

    async fn find_many(
        &self,
        criteria: &Criteria,
        window: PageWindow,
    ) -> Result<ListPage<R>, RepoError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap().clone();
        let matched: Vec<R> = rows
            .into_iter()
            .filter(|row| self.matches(row, criteria))
            .collect();
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit as usize)
            .collect();
        Ok(ListPage {
            items,
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn create(&self, draft: R::Draft) -> Result<R, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let record = R::build(Uuid::new_v4(), draft, OffsetDateTime::now_utc());
        let mut rows = self.rows.lock().unwrap();
        if let Some(slug) = record.slug()
            && rows
                .iter()
                .any(|row| row.slug() == Some(slug) && row.deleted_at().is_none())
        {
            return Err(RepoError::Duplicate {
                constraint: "slug".into(),
            });
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, patch: R::Patch) -> Result<R, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id() == id && row.deleted_at().is_none())
            .ok_or(RepoError::NotFound)?;
        row.apply(patch, OffsetDateTime::now_utc());
        Ok(row.clone())
    }

    async fn mark_deleted(
        &self,
        criteria: &Criteria,
        at: OffsetDateTime,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap().clone();
        let mut stamped = Vec::new();
        for row in rows.iter_mut() {
            if self.matches(row, criteria) {
                row.stamp_deleted(at);
                stamped.push(identity(row));
            }
        }
        *self.rows.lock().unwrap() = rows;
        Ok(stamped)
    }

    async fn mark_status(
        &self,
        criteria: &Criteria,
        status: &'static str,
    ) -> Result<Vec<ResourceIdentity>, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        let mut rows = self.rows.lock().unwrap().clone();
        let mut moved = Vec::new();
        for row in rows.iter_mut() {
            if self.matches(row, criteria) {
                if !row.move_to(status, now) {
                    return Err(RepoError::invalid_input(format!("no status `{status}`")));
                }
                moved.push(identity(row));
            }
        }
        *self.rows.lock().unwrap() = rows;
        Ok(moved)
    }

    async fn delete_where(&self, criteria: &Criteria) -> Result<Vec<ResourceIdentity>, RepoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap().clone();
        let (removed, kept): (Vec<R>, Vec<R>) =
            rows.into_iter().partition(|row| self.matches(row, criteria));
        *self.rows.lock().unwrap() = kept;
        Ok(removed.iter().map(identity).collect())
    }
}

/// Every call fails as if the cache server were unreachable.
pub struct FailingBackend {
    pub calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn fail<T>(&self) -> Result<T, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::transport("connection refused"))
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, BackendError> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), BackendError> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> Result<(), BackendError> {
        self.fail()
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<u64, BackendError> {
        self.fail()
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.fail()
    }
}

/// Answers correctly, but only after `delay`.
pub struct SlowBackend {
    inner: MemoryBackend,
    delay: Duration,
    patterns_only: bool,
}

impl SlowBackend {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::default(),
            delay,
            patterns_only: false,
        })
    }

    /// Slow on pattern deletes only, like a `SCAN` over a large keyspace.
    pub fn patterns_only(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::default(),
            delay,
            patterns_only: true,
        })
    }

    async fn stall(&self) {
        if !self.patterns_only {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl CacheBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.stall().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError> {
        self.stall().await;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.stall().await;
        self.inner.delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_pattern(pattern).await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.stall().await;
        self.inner.ping().await
    }
}

/// A service over a fresh memory store and memory cache.
pub fn service_with<R: Fixture>(
    config: CacheConfig,
) -> (ContentService<R>, Arc<MemoryStore<R>>, Arc<MemoryBackend>) {
    let store = MemoryStore::<R>::new();
    let backend = Arc::new(MemoryBackend::default());
    let cache = CacheStore::new(backend.clone(), &config);
    let service = ContentService::new(store.clone(), cache, config);
    (service, store, backend)
}

pub fn service<R: Fixture>() -> (ContentService<R>, Arc<MemoryStore<R>>, Arc<MemoryBackend>) {
    service_with(CacheConfig::default())
}

pub fn post_draft(slug: &str, status: PostStatus) -> PostDraft {
    PostDraft {
        slug: slug.to_string(),
        title: format!("Post {slug}"),
        excerpt: String::new(),
        body: "body".to_string(),
        status,
        category_id: None,
        tag_ids: Vec::new(),
        published_at: None,
    }
}

pub fn category_draft(slug: &str) -> CategoryDraft {
    CategoryDraft {
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        description: None,
    }
}

pub fn comment_draft(post_id: Uuid, body: &str) -> CommentDraft {
    CommentDraft {
        post_id,
        author_name: "Ada".to_string(),
        author_email: "ada@example.com".to_string(),
        body: body.to_string(),
    }
}
