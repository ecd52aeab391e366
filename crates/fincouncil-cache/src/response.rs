use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use fincouncil_models::agent_message::{AgentId, AgentResponse};
use fincouncil_models::store_schema::key_patterns;
use tracing::debug;

use crate::memory::MemoryCache;

/// Process-scoped cache of agent responses, keyed by role, query and context.
///
/// Created once per process and handed to the coordinator; nothing here is global.
pub struct ResponseCache {
    memory: MemoryCache<AgentResponse>,
}

impl ResponseCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, ttl),
        }
    }

    /// Stable fingerprint of a query plus its financial context.
    pub fn fingerprint(query: &str, financial_context: &serde_json::Value) -> String {
        let mut hasher = DefaultHasher::new();
        query.trim().to_lowercase().hash(&mut hasher);
        financial_context.to_string().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    fn key(agent: AgentId, query: &str, financial_context: &serde_json::Value) -> String {
        key_patterns::response(agent.as_str(), &Self::fingerprint(query, financial_context))
    }

    pub async fn get(
        &self,
        agent: AgentId,
        query: &str,
        financial_context: &serde_json::Value,
    ) -> Option<AgentResponse> {
        let hit = self.memory.get(&Self::key(agent, query, financial_context)).await;
        if hit.is_some() {
            debug!(agent = %agent, "Response cache hit");
        }
        hit
    }

    /// Cache a response. Unusable (empty) responses are never cached.
    pub async fn insert(
        &self,
        response: &AgentResponse,
        query: &str,
        financial_context: &serde_json::Value,
    ) {
        if !response.is_usable() {
            return;
        }
        self.memory
            .insert(
                Self::key(response.agent, query, financial_context),
                response.clone(),
            )
            .await;
    }

    pub async fn len(&self) -> u64 {
        self.memory.entry_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn context() -> serde_json::Value {
        serde_json::json!({"monthly_income": 90000, "debts": [{"kind": "credit_card", "balance": 75000}]})
    }

    #[tokio::test]
    async fn caches_per_agent_and_query() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        let response =
            AgentResponse::new(AgentId::Analyst, "Clear ₹75,000 debt.", dec!(0.8)).unwrap();
        cache.insert(&response, "bonus plan", &context()).await;

        assert_eq!(
            cache.get(AgentId::Analyst, "bonus plan", &context()).await,
            Some(response)
        );
        assert!(cache.get(AgentId::Research, "bonus plan", &context()).await.is_none());
        assert!(cache
            .get(AgentId::Analyst, "car budget", &context())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn fingerprint_ignores_case_and_padding() {
        let a = ResponseCache::fingerprint("  Bonus Plan ", &context());
        let b = ResponseCache::fingerprint("bonus plan", &context());
        assert_eq!(a, b);
        assert_ne!(a, ResponseCache::fingerprint("bonus plan", &serde_json::json!({})));
    }

    #[tokio::test]
    async fn placeholders_are_not_cached() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        cache
            .insert(&AgentResponse::placeholder(AgentId::Research), "q", &context())
            .await;
        assert_eq!(cache.len().await, 0);
    }
}
