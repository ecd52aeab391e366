use std::time::Duration;

use async_trait::async_trait;
use fincouncil_models::session::CollaborationSession;
use fincouncil_models::store_schema::key_patterns;
use tracing::debug;

use crate::error::StoreError;
use crate::memory::MemoryCache;
use crate::sqlite::SqliteSessionStore;
use crate::store::SessionStore;

/// Read-through session store: checks moka (hot) → SQLite (durable) → None.
///
/// Writes go to SQLite first and then to the hot cache. SQLite hits are
/// promoted to moka for subsequent fast access.
pub struct TieredSessionStore {
    memory: MemoryCache<CollaborationSession>,
    sqlite: SqliteSessionStore,
}

impl TieredSessionStore {
    pub fn new(sqlite: SqliteSessionStore, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            sqlite,
        }
    }

    /// Number of sessions currently in the hot cache.
    pub async fn hot_cache_size(&self) -> u64 {
        self.memory.entry_count().await
    }
}

#[async_trait]
impl SessionStore for TieredSessionStore {
    async fn save(&self, session: &CollaborationSession) -> Result<(), StoreError> {
        self.sqlite.insert(session)?;
        self.memory
            .insert(key_patterns::session(&session.session_id), session.clone())
            .await;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<CollaborationSession>, StoreError> {
        let key = key_patterns::session(session_id);
        if let Some(session) = self.memory.get(&key).await {
            return Ok(Some(session));
        }

        let loaded = self.sqlite.load(session_id)?;
        if let Some(session) = &loaded {
            debug!(session_id, "Promoting session from SQLite to hot cache");
            self.memory.insert(key, session.clone()).await;
        }
        Ok(loaded)
    }
}
