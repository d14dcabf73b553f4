use crate::adapters::redis::RedisCache;
use crate::domain::message::{GroupKey, ThreadCursor, UserId};
use crate::domain::pagination::Page;
use opentelemetry::{KeyValue, global, metrics::Counter};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) lookups_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("yym-server");
        Self {
            lookups_total: meter
                .u64_counter("yym_thread_cache_lookups_total")
                .with_description("Thread listing cache lookups by result")
                .build(),
        }
    }
}

/// Everything a memoized thread listing depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadListingKey<'a> {
    pub user_id: UserId,
    pub thread: Option<&'a GroupKey>,
    pub cursor: ThreadCursor,
    pub page: Page,
}

impl ThreadListingKey<'_> {
    fn render(&self, generation: u64) -> String {
        format!(
            "threads:{}:{}:{}:{}:{}:{}",
            self.user_id,
            generation,
            self.thread.map(ToString::to_string).unwrap_or_default(),
            self.cursor.0,
            self.page.offset,
            self.page.limit,
        )
    }
}

fn generation_key(user_id: UserId) -> String {
    format!("threads:gen:{user_id}")
}

/// Outcome of [`ThreadCache::get`].
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Hit(T),
    /// Nothing memoized. Carries the generation to store under, or `None` when the cache is
    /// disabled or unreachable.
    Miss(Option<u64>),
}

/// Short-lived memoization of thread listings.
///
/// Each user has a generation counter that is part of every listing key. Bumping it on any
/// change to the user's threads makes older entries unreachable; they expire on their own.
/// Cache errors are logged and treated as misses.
#[derive(Clone, Debug)]
pub struct ThreadCache {
    cache: Option<RedisCache>,
    metrics: Metrics,
}

impl ThreadCache {
    #[must_use]
    pub fn new(cache: Option<RedisCache>) -> Self {
        Self { cache, metrics: Metrics::new() }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Looks up a memoized listing.
    ///
    /// A miss carries the generation the lookup saw, if any. Pass it to [`Self::put`] so a listing
    /// computed after an invalidation is never stored under the newer generation.
    pub async fn get<T: DeserializeOwned>(&self, key: &ThreadListingKey<'_>) -> Lookup<T> {
        let Some(cache) = self.cache.as_ref() else {
            return Lookup::Miss(None);
        };

        let generation = match cache.counter(&generation_key(key.user_id)).await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(error = %e, "Thread cache lookup failed");
                self.metrics.lookups_total.add(1, &[KeyValue::new("result", "error")]);
                return Lookup::Miss(None);
            }
        };

        let lookup = async {
            let bytes = cache.get(&key.render(generation)).await?;
            anyhow::Ok(bytes.map(|b| serde_json::from_slice::<T>(&b)).transpose()?)
        };

        match lookup.await {
            Ok(Some(value)) => {
                self.metrics.lookups_total.add(1, &[KeyValue::new("result", "hit")]);
                Lookup::Hit(value)
            }
            Ok(None) => {
                self.metrics.lookups_total.add(1, &[KeyValue::new("result", "miss")]);
                Lookup::Miss(Some(generation))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Thread cache lookup failed");
                self.metrics.lookups_total.add(1, &[KeyValue::new("result", "error")]);
                Lookup::Miss(Some(generation))
            }
        }
    }

    /// Stores a listing under the generation returned by the preceding [`Self::get`].
    pub async fn put<T: Serialize + Sync>(&self, key: &ThreadListingKey<'_>, generation: u64, value: &T) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };

        let store = async {
            let bytes = serde_json::to_vec(value)?;
            cache.set(&key.render(generation), &bytes).await
        };

        if let Err(e) = store.await {
            tracing::warn!(error = %e, "Thread cache store failed");
        }
    }

    /// Drops every memoized listing of the given users.
    pub async fn invalidate_users(&self, users: &[UserId]) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };

        for user_id in users {
            if let Err(e) = cache.increment(&generation_key(*user_id)).await {
                tracing::warn!(error = %e, user_id = %user_id, "Thread cache invalidation failed");
            }
        }
    }

    /// Drops memoized listings of both participants of a thread.
    pub async fn invalidate_thread(&self, thread: &GroupKey) {
        let (a, b) = thread.participants();
        self.invalidate_users(&[a, b]).await;
    }
}
