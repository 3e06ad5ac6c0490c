//! Service bundle shared by every entry point.

use std::sync::Arc;

use crate::application::comments::CommentService;
use crate::application::content::ContentService;
use crate::application::repos::RecordStore;
use crate::cache::{CacheConfig, CacheStore, InvalidationCoordinator};
use crate::domain::entities::{
    CategoryRecord, CommentRecord, PostRecord, ProductRecord, TagRecord,
};
use crate::domain::kinds::ResourceKind;

/// One content service per kind, all over the same store and cache.
#[derive(Clone)]
pub struct ContentServices {
    pub posts: ContentService<PostRecord>,
    pub categories: ContentService<CategoryRecord>,
    pub tags: ContentService<TagRecord>,
    pub products: ContentService<ProductRecord>,
    pub comments: CommentService,
    cache: CacheStore,
}

impl ContentServices {
    pub fn new<S>(store: Arc<S>, cache: CacheStore, config: CacheConfig) -> Self
    where
        S: RecordStore<PostRecord>
            + RecordStore<CategoryRecord>
            + RecordStore<TagRecord>
            + RecordStore<ProductRecord>
            + RecordStore<CommentRecord>
            + 'static,
    {
        let posts: Arc<dyn RecordStore<PostRecord>> = store.clone();
        let categories: Arc<dyn RecordStore<CategoryRecord>> = store.clone();
        let tags: Arc<dyn RecordStore<TagRecord>> = store.clone();
        let products: Arc<dyn RecordStore<ProductRecord>> = store.clone();
        let comments: Arc<dyn RecordStore<CommentRecord>> = store;

        Self {
            posts: ContentService::new(posts, cache.clone(), config.clone()),
            categories: ContentService::new(categories, cache.clone(), config.clone()),
            tags: ContentService::new(tags, cache.clone(), config.clone()),
            products: ContentService::new(products, cache.clone(), config.clone()),
            comments: CommentService::new(ContentService::new(comments, cache.clone(), config)),
            cache,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Drop every cached key of the given kinds (all kinds when empty).
    pub async fn purge(&self, kinds: &[ResourceKind]) -> u64 {
        InvalidationCoordinator::new(self.cache.clone())
            .purge(kinds)
            .await
    }
}
