use common::{TestApp, fresh_user};
use std::sync::Arc;
use uuid::Uuid;
use yym_server::adapters::redis::{RedisCache, RedisClient};
use yym_server::domain::message::{ThreadCursor, UserId};
use yym_server::domain::pagination::Page;
use yym_server::services::thread_cache::{Lookup, ThreadCache, ThreadListingKey};

mod common;

async fn redis_client() -> Arc<RedisClient> {
    let config = common::get_test_config(Some(&common::redis_url()));
    RedisClient::connect(&common::redis_url(), &config.cache).await.expect("Failed to connect to Redis")
}

#[tokio::test]
async fn test_redis_cache_basic_operations() {
    let cache = RedisCache::new(redis_client().await, "test:cache:".to_string(), 60);

    let key = Uuid::new_v4().to_string();
    let value = b"hello world".to_vec();

    assert_eq!(cache.get(&key).await.unwrap(), None);

    cache.set(&key, &value).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), Some(value));

    assert_eq!(cache.counter(&key).await.unwrap(), 0);
    assert_eq!(cache.increment(&key).await.unwrap(), 1);
    assert_eq!(cache.increment(&key).await.unwrap(), 2);
    assert_eq!(cache.counter(&key).await.unwrap(), 2);
}

#[tokio::test]
async fn test_redis_cache_expiration() {
    let cache = RedisCache::new(redis_client().await, "test:cache:expire:".to_string(), 1);

    let key = Uuid::new_v4().to_string();
    cache.set(&key, b"temporary").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    assert_eq!(cache.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_thread_cache_invalidation_by_generation() {
    let cache = ThreadCache::new(Some(RedisCache::new(redis_client().await, "test:threads:".to_string(), 60)));
    let user = UserId(fresh_user());
    let key = ThreadListingKey { user_id: user, thread: None, cursor: ThreadCursor(0), page: Page { offset: 0, limit: 20 } };

    let Lookup::Miss(Some(generation)) = cache.get::<Vec<String>>(&key).await else {
        panic!("expected a miss at a known generation");
    };
    cache.put(&key, generation, &vec!["first".to_string()]).await;
    assert_eq!(cache.get::<Vec<String>>(&key).await, Lookup::Hit(vec!["first".to_string()]));

    cache.invalidate_users(&[user]).await;
    assert_eq!(cache.get::<Vec<String>>(&key).await, Lookup::Miss(Some(generation + 1)));
}

#[tokio::test]
async fn test_listing_computed_before_invalidation_is_not_served() {
    let cache = ThreadCache::new(Some(RedisCache::new(redis_client().await, "test:threads:".to_string(), 60)));
    let user = UserId(fresh_user());
    let key = ThreadListingKey { user_id: user, thread: None, cursor: ThreadCursor(0), page: Page { offset: 0, limit: 20 } };

    let Lookup::Miss(Some(generation)) = cache.get::<Vec<String>>(&key).await else {
        panic!("expected a miss at a known generation");
    };

    // A send lands while the listing is being computed.
    cache.invalidate_users(&[user]).await;
    cache.put(&key, generation, &vec!["stale".to_string()]).await;

    assert_eq!(cache.get::<Vec<String>>(&key).await, Lookup::Miss(Some(generation + 1)));
}

#[tokio::test]
async fn test_memoized_listing_reflects_new_activity() {
    let app = TestApp::spawn_with_cache().await;
    let alice = fresh_user();
    let bob = fresh_user();

    app.send(alice, bob, "first").await;
    let threads = app.threads(bob, "").await;
    assert_eq!(threads[0]["unread"], 1);
    // Served from cache the second time; must be identical.
    assert_eq!(app.threads(bob, "").await, threads);

    app.send(alice, bob, "second").await;
    let threads = app.threads(bob, "").await;
    assert_eq!(threads[0]["content"], "second");
    assert_eq!(threads[0]["unread"], 2);

    app.messages(bob, "").await;
    assert_eq!(app.threads(bob, "").await[0]["unread"], 0);

    let id = app.send(bob, alice, "oops").await;
    assert_eq!(app.threads(alice, "").await[0]["id"], id);
    app.signed_delete(&format!("/rpc/messages/{id}")).await;
    assert_ne!(app.threads(alice, "").await[0]["id"], id);
}
