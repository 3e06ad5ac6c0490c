mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use folio::application::comments::CommentService;
use folio::application::content::{ContentError, ContentService};
use folio::application::query::{Audience, ListParams};
use folio::application::repos::{Criteria, RepoError};
use folio::cache::{CacheConfig, CacheStore, keys};
use folio::domain::entities::{CategoryPatch, CategoryRecord, CommentRecord, PostPatch, PostRecord};
use folio::domain::error::DomainError;
use folio::domain::kinds::ResourceKind;
use folio::domain::types::{CommentStatus, PostStatus};
use uuid::Uuid;

use support::{
    FailingBackend, MemoryStore, SlowBackend, category_draft, comment_draft, post_draft, service,
    service_with,
};

#[tokio::test]
async fn deleted_records_are_not_found_by_default() {
    let (posts, _, _) = service::<PostRecord>();
    let post = posts
        .create(post_draft("hello", PostStatus::Published))
        .await
        .unwrap();
    assert!(posts.get_by_id(post.id, Audience::Public).await.unwrap().is_some());
    posts.delete(post.id).await.unwrap();
    assert!(posts.get_by_id(post.id, Audience::Privileged).await.unwrap().is_none());

    let (categories, _, _) = service::<CategoryRecord>();
    let category = categories.create(category_draft("tech")).await.unwrap();
    categories
        .get_by_id(category.id, Audience::Public)
        .await
        .unwrap();
    categories.delete(category.id).await.unwrap();
    assert!(
        categories
            .get_by_id(category.id, Audience::Public)
            .await
            .unwrap()
            .is_none()
    );

    let (comments, store, _) = service::<CommentRecord>();
    let comment = comments
        .create(comment_draft(Uuid::new_v4(), "hi"))
        .await
        .unwrap();
    comments
        .get_by_id(comment.id, Audience::Privileged)
        .await
        .unwrap();
    comments.delete(comment.id).await.unwrap();
    assert!(
        comments
            .get_by_id(comment.id, Audience::Privileged)
            .await
            .unwrap()
            .is_none()
    );

    // The row is kept, moved into its terminal status.
    let kept = comments
        .get_including_deleted(comment.id)
        .await
        .unwrap()
        .expect("deleted comment is retained");
    assert_eq!(kept.status, CommentStatus::Rejected);
    assert_eq!(store.rows().len(), 1);
    assert!(matches!(
        comments.delete(comment.id).await,
        Err(ContentError::NotFound { .. })
    ));
}

#[tokio::test]
async fn rename_serves_neither_stale_slug_nor_stale_miss() {
    let (categories, _, _) = service::<CategoryRecord>();
    let category = categories.create(category_draft("tech")).await.unwrap();

    // Warm both the old slug and a negative entry for the new one.
    assert!(
        categories
            .get_by_slug("tech", Audience::Public)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        categories
            .get_by_slug("technology", Audience::Public)
            .await
            .unwrap()
            .is_none()
    );

    categories
        .update(
            category.id,
            CategoryPatch {
                slug: Some("technology".into()),
                ..CategoryPatch::default()
            },
        )
        .await
        .unwrap();

    assert!(
        categories
            .get_by_slug("tech", Audience::Public)
            .await
            .unwrap()
            .is_none()
    );
    let renamed = categories
        .get_by_slug("technology", Audience::Public)
        .await
        .unwrap()
        .expect("renamed category");
    assert_eq!(renamed.id, category.id);
}

#[tokio::test]
async fn repeated_list_is_served_from_cache() {
    let (posts, store, _) = service::<PostRecord>();
    let category_id = Uuid::new_v4();
    store.alias("tech", category_id);
    for slug in ["a", "b", "c"] {
        let mut draft = post_draft(slug, PostStatus::Published);
        draft.category_id = Some(category_id);
        posts.create(draft).await.unwrap();
    }
    posts
        .create(post_draft("elsewhere", PostStatus::Published))
        .await
        .unwrap();

    let params = ListParams::default()
        .page(1)
        .limit(10)
        .filter("category", "tech");
    let first = posts.list(&params, Audience::Public).await.unwrap();
    let second = posts.list(&params, Audience::Public).await.unwrap();

    assert_eq!(first.total, 3);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(store.list_calls(), 1);
}

#[tokio::test]
async fn search_lists_always_hit_the_store() {
    let (posts, store, backend) = service::<PostRecord>();
    posts
        .create(post_draft("rust-tips", PostStatus::Published))
        .await
        .unwrap();

    let params = ListParams::default().search("rust");
    let first = posts.list(&params, Audience::Public).await.unwrap();
    posts.list(&params, Audience::Public).await.unwrap();

    assert_eq!(first.total, 1);
    assert_eq!(store.list_calls(), 2);
    assert!(
        backend
            .keys()
            .iter()
            .all(|key| !key.starts_with("posts:list:"))
    );
}

#[tokio::test]
async fn soft_deleted_post_is_hidden_but_recoverable_by_privileged_lookup() {
    let (posts, store, _) = service::<PostRecord>();
    let post = posts
        .create(post_draft("gone", PostStatus::Published))
        .await
        .unwrap();
    posts
        .create(post_draft("kept", PostStatus::Published))
        .await
        .unwrap();

    posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    posts.get_by_slug("gone", Audience::Public).await.unwrap();

    let removed = posts.delete(post.id).await.unwrap();
    assert_eq!(removed.slug.as_deref(), Some("gone"));

    let page = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items.iter().all(|item| item.id != post.id));
    assert!(
        posts
            .get_by_slug("gone", Audience::Public)
            .await
            .unwrap()
            .is_none()
    );

    let recovered = posts
        .get_including_deleted(post.id)
        .await
        .unwrap()
        .expect("privileged lookup");
    assert!(recovered.deleted_at.is_some());

    let everything = posts
        .list(
            &ListParams::default().include_deleted(),
            Audience::Privileged,
        )
        .await
        .unwrap();
    assert_eq!(everything.total, 2);

    // The row is still stored; only its marker changed.
    assert_eq!(store.rows().len(), 2);
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let (posts, _, _) = service::<PostRecord>();
    let post = posts
        .create(post_draft("once", PostStatus::Draft))
        .await
        .unwrap();
    posts.delete(post.id).await.unwrap();

    let err = posts.delete(post.id).await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound { id, .. } if id == post.id));
}

#[tokio::test]
async fn concurrent_creates_both_show_up_in_the_next_list() {
    let (posts, _, _) = service::<PostRecord>();
    posts
        .create(post_draft("first", PostStatus::Published))
        .await
        .unwrap();
    let warmed = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(warmed.total, 1);

    let (left, right) = tokio::join!(
        posts.create(post_draft("left", PostStatus::Published)),
        posts.create(post_draft("right", PostStatus::Published)),
    );
    left.unwrap();
    right.unwrap();

    let page = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn failing_cache_never_fails_a_call() {
    let backend = FailingBackend::new();
    let config = CacheConfig::default();
    let store = MemoryStore::<PostRecord>::new();
    let posts = ContentService::new(
        store.clone(),
        CacheStore::new(backend.clone(), &config),
        config,
    );

    let post = posts
        .create(post_draft("resilient", PostStatus::Published))
        .await
        .unwrap();
    assert!(posts.get_by_id(post.id, Audience::Public).await.unwrap().is_some());
    assert!(
        posts
            .get_by_slug("resilient", Audience::Public)
            .await
            .unwrap()
            .is_some()
    );
    let page = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    posts
        .update(
            post.id,
            PostPatch {
                title: Some("Still here".into()),
                ..PostPatch::default()
            },
        )
        .await
        .unwrap();
    posts.delete(post.id).await.unwrap();

    assert!(backend.calls.load(std::sync::atomic::Ordering::SeqCst) > 0);
    assert!(posts.cache().ping().await.is_err());
}

#[tokio::test]
async fn slow_cache_is_cut_off_by_the_op_timeout() {
    let config = CacheConfig {
        op_timeout: Duration::from_millis(10),
        pattern_timeout: Duration::from_millis(10),
        ..CacheConfig::default()
    };
    let store = MemoryStore::<PostRecord>::new();
    let posts = ContentService::new(
        store.clone(),
        CacheStore::new(SlowBackend::new(Duration::from_secs(2)), &config),
        config,
    );
    let post = posts
        .create(post_draft("slow", PostStatus::Published))
        .await
        .unwrap();

    let started = Instant::now();
    let found = posts.get_by_id(post.id, Audience::Public).await.unwrap();
    assert!(found.is_some());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn slow_pattern_delete_still_invalidates_lists() {
    let config = CacheConfig {
        op_timeout: Duration::from_millis(10),
        pattern_timeout: Duration::from_secs(2),
        ..CacheConfig::default()
    };
    let store = MemoryStore::<PostRecord>::new();
    let posts = ContentService::new(
        store.clone(),
        CacheStore::new(SlowBackend::patterns_only(Duration::from_millis(100)), &config),
        config,
    );
    posts
        .create(post_draft("first", PostStatus::Published))
        .await
        .unwrap();

    let before = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(before.total, 1);

    posts
        .create(post_draft("second", PostStatus::Published))
        .await
        .unwrap();
    let after = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();

    assert_eq!(after.total, 2);
    assert_eq!(store.list_calls(), 2);
}

#[tokio::test]
async fn disabled_cache_passes_every_read_through() {
    let (posts, store, backend) = service_with::<PostRecord>(CacheConfig::disabled());
    let post = posts
        .create(post_draft("plain", PostStatus::Published))
        .await
        .unwrap();

    posts.get_by_id(post.id, Audience::Public).await.unwrap();
    posts.get_by_id(post.id, Audience::Public).await.unwrap();

    assert_eq!(store.find_calls(), 2);
    assert!(backend.is_empty());
    assert!(!posts.cache().is_enabled());
}

#[tokio::test]
async fn detail_reads_are_cached_until_a_write() {
    let (posts, store, _) = service::<PostRecord>();
    let post = posts
        .create(post_draft("cached", PostStatus::Published))
        .await
        .unwrap();

    posts.get_by_id(post.id, Audience::Public).await.unwrap();
    store.tamper(post.id, |row| row.title = "changed behind the cache".into());
    let cached = posts
        .get_by_id(post.id, Audience::Public)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.title, post.title);
    assert_eq!(store.find_calls(), 1);

    posts
        .update(
            post.id,
            PostPatch {
                title: Some("Edited".into()),
                ..PostPatch::default()
            },
        )
        .await
        .unwrap();
    let fresh = posts
        .get_by_id(post.id, Audience::Public)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.title, "Edited");
}

#[tokio::test]
async fn freshness_mode_skips_the_cache_for_slug_reads() {
    let config = CacheConfig {
        freshness_mode: true,
        ..CacheConfig::default()
    };
    let (posts, store, backend) = service_with::<PostRecord>(config);
    posts
        .create(post_draft("live", PostStatus::Published))
        .await
        .unwrap();

    posts.get_by_slug("live", Audience::Public).await.unwrap();
    posts.get_by_slug("live", Audience::Public).await.unwrap();

    assert_eq!(store.find_calls(), 2);
    assert!(
        !backend
            .keys()
            .contains(&keys::slug_key(ResourceKind::Post, "live"))
    );
}

#[tokio::test]
async fn cached_miss_does_not_outlive_creation() {
    let (categories, store, backend) = service::<CategoryRecord>();

    assert!(
        categories
            .get_by_slug("fresh", Audience::Public)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        backend
            .keys()
            .contains(&keys::slug_key(ResourceKind::Category, "fresh"))
    );

    categories.create(category_draft("fresh")).await.unwrap();
    let found = categories
        .get_by_slug("fresh", Audience::Public)
        .await
        .unwrap();
    assert!(found.is_some());
    assert_eq!(store.find_calls(), 2);
}

#[tokio::test]
async fn public_readers_only_see_published_posts() {
    let (posts, _, _) = service::<PostRecord>();
    let draft = posts
        .create(post_draft("wip", PostStatus::Draft))
        .await
        .unwrap();

    assert!(posts.get_by_id(draft.id, Audience::Public).await.unwrap().is_none());
    assert!(
        posts
            .get_by_id(draft.id, Audience::Privileged)
            .await
            .unwrap()
            .is_some()
    );

    let public = posts
        .list(&ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(public.total, 0);
    let privileged = posts
        .list(&ListParams::default(), Audience::Privileged)
        .await
        .unwrap();
    assert_eq!(privileged.total, 1);

    let err = posts
        .list(&ListParams::default().filter("status", "draft"), Audience::Public)
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Compose(_)));
}

#[tokio::test]
async fn unfiltered_bulk_delete_is_refused() {
    let (categories, store, _) = service::<CategoryRecord>();
    categories.create(category_draft("keep")).await.unwrap();

    let err = categories
        .delete_many(&Criteria::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Repo(RepoError::InvalidInput { .. })
    ));
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn bulk_soft_delete_keeps_the_caller_filter() {
    let (posts, store, _) = service::<PostRecord>();
    posts
        .create(post_draft("d1", PostStatus::Draft))
        .await
        .unwrap();
    posts
        .create(post_draft("d2", PostStatus::Draft))
        .await
        .unwrap();
    posts
        .create(post_draft("p1", PostStatus::Published))
        .await
        .unwrap();

    let removed = posts
        .delete_many(&Criteria::default().with_field("status", "draft"))
        .await
        .unwrap();

    assert_eq!(removed, 2);
    let live: Vec<_> = store
        .rows()
        .into_iter()
        .filter(|row| row.deleted_at.is_none())
        .map(|row| row.slug)
        .collect();
    assert_eq!(live, vec!["p1".to_string()]);
}

#[tokio::test]
async fn unique_slug_skips_taken_candidates() {
    let (categories, _, _) = service::<CategoryRecord>();
    categories.create(category_draft("hello-world")).await.unwrap();

    let slug = categories.unique_slug("Hello World").await.unwrap();
    assert_eq!(slug, "hello-world-2");

    let (comments, _, _) = service::<CommentRecord>();
    assert!(matches!(
        comments.unique_slug("anything").await,
        Err(ContentError::Unsupported { .. })
    ));
}

#[tokio::test]
async fn comments_move_through_moderation() {
    let (content, _, _) = service::<CommentRecord>();
    let comments = CommentService::new(content);
    let post_id = Uuid::new_v4();

    let comment = comments
        .submit(comment_draft(post_id, "  Nice post  "))
        .await
        .unwrap();
    assert_eq!(comment.status, CommentStatus::Pending);
    assert_eq!(comment.body, "Nice post");

    let public = comments
        .list_for_post(post_id, ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(public.total, 0);

    comments.approve(comment.id).await.unwrap();
    let public = comments
        .list_for_post(post_id, ListParams::default(), Audience::Public)
        .await
        .unwrap();
    assert_eq!(public.total, 1);

    comments.remove(comment.id).await.unwrap();
    assert!(
        comments
            .content()
            .get_by_id(comment.id, Audience::Privileged)
            .await
            .unwrap()
            .is_none()
    );
    let rejected = comments
        .content()
        .get_including_deleted(comment.id)
        .await
        .unwrap()
        .expect("rejected comment is retained");
    assert_eq!(rejected.status, CommentStatus::Rejected);

    let err = comments.approve(comment.id).await.unwrap_err();
    assert!(matches!(
        err,
        ContentError::Domain(DomainError::Invariant { .. })
    ));
}

#[tokio::test]
async fn blank_comment_fields_are_rejected() {
    let (content, store, _) = service::<CommentRecord>();
    let comments = CommentService::new(content);

    let err = comments
        .submit(comment_draft(Uuid::new_v4(), "   "))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentError::Domain(DomainError::Validation { .. })
    ));
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn comments_have_no_slug_lookup() {
    let (comments, _, _) = service::<CommentRecord>();
    let err = comments
        .get_by_slug("anything", Audience::Public)
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Unsupported { .. }));
}

#[tokio::test]
async fn category_write_clears_dependent_post_lists() {
    let backend = Arc::new(folio::cache::MemoryBackend::default());
    let config = CacheConfig::default();
    let cache = CacheStore::new(backend.clone(), &config);
    let post_store = MemoryStore::<PostRecord>::new();
    let category_store = MemoryStore::<CategoryRecord>::new();
    let posts = ContentService::new(post_store.clone(), cache.clone(), config.clone());
    let categories = ContentService::new(category_store, cache, config);

    posts
        .list(&ListParams::default().filter("category", "tech"), Audience::Public)
        .await
        .unwrap();
    assert!(backend.keys().iter().any(|key| key.starts_with("posts:list:")));

    categories.create(category_draft("tech")).await.unwrap();

    assert!(backend.keys().iter().all(|key| !key.starts_with("posts:list:")));
}

#[tokio::test]
async fn category_delete_refreshes_posts_that_pointed_at_it() {
    let backend = Arc::new(folio::cache::MemoryBackend::default());
    let config = CacheConfig::default();
    let cache = CacheStore::new(backend.clone(), &config);
    let post_store = MemoryStore::<PostRecord>::new();
    let posts = ContentService::new(post_store.clone(), cache.clone(), config.clone());
    let categories = ContentService::new(MemoryStore::<CategoryRecord>::new(), cache, config);

    let category = categories.create(category_draft("tech")).await.unwrap();
    let mut draft = post_draft("filed", PostStatus::Published);
    draft.category_id = Some(category.id);
    let post = posts.create(draft).await.unwrap();
    posts.get_by_id(post.id, Audience::Public).await.unwrap();

    // The database nulls the reference as part of the delete.
    post_store.tamper(post.id, |row| row.category_id = None);
    categories.delete(category.id).await.unwrap();

    let fresh = posts
        .get_by_id(post.id, Audience::Public)
        .await
        .unwrap()
        .expect("post survives its category");
    assert_eq!(fresh.category_id, None);
}
