//! Integration tests against the real Claude CLI.
//!
//! Ignored by default. They need the `claude` CLI on PATH with working
//! credentials. Run explicitly with:
//! ```bash
//! cargo test -p fincouncil-agents --test cli_integration -- --ignored
//! ```

use std::time::Duration;

use fincouncil_agents::claude_cli::{check_cli_available, invoke_claude, ClaudeCliConfig};
use fincouncil_agents::{AdvisorAgent, ClaudeAdvisor};
use fincouncil_models::agent_message::{AgentId, AgentRequest};
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(check_cli_available().await, "claude CLI not found on PATH");
}

/// A live advisor should come back with usable, attributed advice.
#[tokio::test]
#[ignore]
async fn risk_advisor_answers_a_bonus_question() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let advisor = ClaudeAdvisor::new(
        AgentId::RiskManagement,
        "claude-3-5-haiku-latest".to_string(),
        Duration::from_secs(60),
    );
    let request = AgentRequest {
        request_id: Uuid::new_v4(),
        session_id: "cli-integration".to_string(),
        agent: AgentId::RiskManagement,
        query: "what to do with a ₹1,00,000 bonus".to_string(),
        financial_context: serde_json::json!({
            "bonus": 100000,
            "debt": 75000,
            "debt_interest_rate": 14
        }),
    };

    let response = advisor.analyze(&request).await.expect("advisor call failed");
    assert_eq!(response.agent, AgentId::RiskManagement);
    assert!(response.is_usable(), "empty analysis: {response:?}");
}

#[tokio::test]
#[ignore]
async fn cli_reports_errors_for_invalid_model() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let config = ClaudeCliConfig {
        model: "nonexistent-model-12345".to_string(),
        timeout: Duration::from_secs(15),
        ..ClaudeCliConfig::default()
    };
    let result = invoke_claude("You are a test.", "hello", &config).await;
    assert!(result.is_err(), "expected an error, got {result:?}");
}
