use std::time::Duration;

use moka::future::Cache;

/// String-keyed moka cache shared by the response cache and the session tiers.
///
/// Always bounded by capacity. A TTL is optional: responses go stale,
/// completed sessions do not.
pub struct MemoryCache<V> {
    inner: Cache<String, V>,
    ttl: Option<Duration>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self::build(max_capacity, Some(ttl))
    }

    pub fn without_ttl(max_capacity: u64) -> Self {
        Self::build(max_capacity, None)
    }

    fn build(max_capacity: u64, ttl: Option<Duration>) -> Self {
        let builder = Cache::builder().max_capacity(max_capacity);
        let inner = match ttl {
            Some(ttl) => builder.time_to_live(ttl).build(),
            None => builder.build(),
        };
        Self { inner, ttl }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Entry count after pending evictions have run.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
