use async_trait::async_trait;
use fincouncil_models::session::CollaborationSession;
use fincouncil_models::store_schema::key_patterns;

use crate::error::StoreError;
use crate::memory::MemoryCache;

/// Persistence for completed collaboration sessions. Mockable for testing.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a completed session, replacing any previous record with the same id.
    async fn save(&self, session: &CollaborationSession) -> Result<(), StoreError>;

    /// Look up a session by id. `Ok(None)` means it was never stored (or was evicted).
    async fn get(&self, session_id: &str) -> Result<Option<CollaborationSession>, StoreError>;
}

/// Session store that keeps everything in a moka cache. Sessions are only
/// evicted when capacity is exceeded.
pub struct MemorySessionStore {
    memory: MemoryCache<CollaborationSession>,
}

impl MemorySessionStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            memory: MemoryCache::without_ttl(max_capacity),
        }
    }

    pub async fn len(&self) -> u64 {
        self.memory.entry_count().await
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &CollaborationSession) -> Result<(), StoreError> {
        self.memory
            .insert(key_patterns::session(&session.session_id), session.clone())
            .await;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<CollaborationSession>, StoreError> {
        Ok(self.memory.get(&key_patterns::session(session_id)).await)
    }
}
