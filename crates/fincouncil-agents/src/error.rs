use std::time::Duration;

use fincouncil_cache::StoreError;
use fincouncil_models::session::SessionStage;
use thiserror::Error;

/// Failures of a single advisor call. The coordinator recovers from all of them.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Infrastructure-level failures of a collaboration run. Business-level
/// problems (failed agents, irrelevant answers) never surface here.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {0} was cancelled")]
    Cancelled(String),

    #[error("Invalid stage transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionStage, to: SessionStage },

    #[error("Invalid amount pattern: {0}")]
    Pattern(#[from] regex::Error),
}
