/// The SQLite table the session store persists completed sessions into.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS collaboration_sessions (
///     session_id          TEXT PRIMARY KEY,
///     user_query          TEXT NOT NULL,
///     overall_confidence  TEXT NOT NULL,
///     session_json        TEXT NOT NULL,
///     created_at          TEXT NOT NULL,
///     completed_at        TEXT NOT NULL
/// );
/// ```
pub const SESSION_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS collaboration_sessions (
    session_id          TEXT PRIMARY KEY,
    user_query          TEXT NOT NULL,
    overall_confidence  TEXT NOT NULL,
    session_json        TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    completed_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_completed ON collaboration_sessions(completed_at);
";

/// Key conventions for the in-memory caches.
///
/// - Sessions: `session:{session_id}`
/// - Agent responses: `response:{agent}:{fingerprint}`
pub mod key_patterns {
    pub fn session(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    pub fn response(agent: &str, fingerprint: &str) -> String {
        format!("response:{agent}:{fingerprint}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pattern_session() {
        assert_eq!(key_patterns::session("abc"), "session:abc");
    }

    #[test]
    fn key_pattern_response() {
        assert_eq!(
            key_patterns::response("analyst", "1f2e"),
            "response:analyst:1f2e"
        );
    }
}
