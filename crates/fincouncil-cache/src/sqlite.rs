use std::sync::Mutex;

use async_trait::async_trait;
use fincouncil_models::session::CollaborationSession;
use rusqlite::Connection;

use crate::error::StoreError;
use crate::store::SessionStore;

/// SQLite-backed session store. Each session is stored as one JSON document
/// with a few indexed columns alongside it.
///
/// Access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the session database at `path`. Enables WAL mode.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(fincouncil_models::store_schema::SESSION_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(fincouncil_models::store_schema::SESSION_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    pub fn insert(&self, session: &CollaborationSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO collaboration_sessions \
             (session_id, user_query, overall_confidence, session_json, created_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                session.session_id,
                session.user_query,
                session.overall_confidence.to_string(),
                json,
                session.created_at.to_rfc3339(),
                session.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Option<CollaborationSession>, StoreError> {
        let json = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare_cached(
                "SELECT session_json FROM collaboration_sessions WHERE session_id = ?1",
            )?;
            let result = stmt.query_row(rusqlite::params![session_id], |row| {
                row.get::<_, String>(0)
            });
            match result {
                Ok(json) => json,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(StoreError::Sqlite(e)),
            }
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Count all stored sessions.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM collaboration_sessions",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, session: &CollaborationSession) -> Result<(), StoreError> {
        self.insert(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<CollaborationSession>, StoreError> {
        self.load(session_id)
    }
}
