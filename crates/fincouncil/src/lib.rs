//! fincouncil - a council of three financial advisors
//!
//! Sends a user's money question to an analyst, a research strategist and a
//! risk guardian concurrently, detects where their advice disagrees, narrates
//! how the disagreement is settled, and synthesizes one answer.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use fincouncil::models::config::CouncilConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let coordinator = fincouncil::build_coordinator(&CouncilConfig::default())?;
//! let session = fincouncil::run_collaboration(
//!     &coordinator,
//!     "what to do with a ₹1,00,000 bonus",
//!     serde_json::json!({"debt": 75000}),
//!     None,
//! )
//! .await?;
//! println!("{}", session.final_answer);
//! # Ok(())
//! # }
//! ```

pub use fincouncil_agents as agents;
pub use fincouncil_cache as cache;
pub use fincouncil_models as models;

use std::sync::Arc;
use std::time::Duration;

use fincouncil_agents::{AdvisorAgent, ClaudeAdvisor, CollaborationCoordinator, CoordinatorError};
use fincouncil_cache::{ResponseCache, SessionStore, SqliteSessionStore, TieredSessionStore};
use fincouncil_models::config::CouncilConfig;
use fincouncil_models::session::CollaborationSession;

/// Build a coordinator backed by Claude CLI advisors and the tiered session store.
pub fn build_coordinator(config: &CouncilConfig) -> Result<CollaborationCoordinator, anyhow::Error> {
    let sqlite = SqliteSessionStore::open(&config.store.sqlite_path)?;
    let store: Arc<dyn SessionStore> = Arc::new(TieredSessionStore::new(
        sqlite,
        config.store.memory_max_capacity,
        Duration::from_secs(config.store.memory_ttl_seconds),
    ));

    let timeout = config.agents.agent_timeout();
    let advisors: Vec<Arc<dyn AdvisorAgent>> = config
        .agents
        .advisors
        .iter()
        .filter(|a| a.enabled)
        .map(|a| {
            let model = a.model.clone().unwrap_or_else(|| config.agents.model.clone());
            Arc::new(ClaudeAdvisor::new(a.agent, model, timeout)) as Arc<dyn AdvisorAgent>
        })
        .collect();

    build_with_advisors(config, advisors, store)
}

/// Build a coordinator around caller-supplied advisors and store.
pub fn build_with_advisors(
    config: &CouncilConfig,
    advisors: Vec<Arc<dyn AdvisorAgent>>,
    store: Arc<dyn SessionStore>,
) -> Result<CollaborationCoordinator, anyhow::Error> {
    let mut coordinator = CollaborationCoordinator::new(
        advisors,
        store,
        config.agents.agent_timeout(),
        &config.collaboration,
    )?;

    if config.agents.response_cache_ttl_seconds > 0 {
        coordinator = coordinator.with_response_cache(Arc::new(ResponseCache::new(
            config.agents.response_cache_capacity,
            Duration::from_secs(config.agents.response_cache_ttl_seconds),
        )));
    }

    Ok(coordinator)
}

/// Run one collaboration with the given coordinator.
pub async fn run_collaboration(
    coordinator: &CollaborationCoordinator,
    query: &str,
    financial_context: serde_json::Value,
    session_id: Option<String>,
) -> Result<CollaborationSession, CoordinatorError> {
    coordinator
        .run_collaboration(query, financial_context, session_id)
        .await
}

/// Fetch a completed session by id.
pub async fn get_session(
    coordinator: &CollaborationCoordinator,
    session_id: &str,
) -> Result<CollaborationSession, CoordinatorError> {
    coordinator.get_session(session_id).await
}
