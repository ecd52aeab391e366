use async_trait::async_trait;
use fincouncil_models::agent_message::{AgentId, AgentRequest, AgentResponse};

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::AgentError;
use crate::parser::parse_agent_response;
use crate::prompts::advisor_prompt;

/// One member of the advisory council. Mockable for testing.
#[async_trait]
pub trait AdvisorAgent: Send + Sync {
    fn id(&self) -> AgentId;

    async fn analyze(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

/// An advisor backed by the Claude CLI.
pub struct ClaudeAdvisor {
    pub agent: AgentId,
    pub cli_config: ClaudeCliConfig,
}

impl ClaudeAdvisor {
    pub fn new(agent: AgentId, model: String, timeout: std::time::Duration) -> Self {
        Self {
            agent,
            cli_config: ClaudeCliConfig::new(model, timeout),
        }
    }
}

#[async_trait]
impl AdvisorAgent for ClaudeAdvisor {
    fn id(&self) -> AgentId {
        self.agent
    }

    async fn analyze(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let system_prompt = advisor_prompt(self.agent);
        let user_prompt = serde_json::to_string(request)?;
        let raw_output = invoke_claude(&system_prompt, &user_prompt, &self.cli_config).await?;
        parse_agent_response(self.agent, &raw_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn claude_advisor_reports_its_role() {
        let advisor = ClaudeAdvisor::new(
            AgentId::RiskManagement,
            "claude-3-5-haiku-latest".to_string(),
            Duration::from_secs(5),
        );
        assert_eq!(advisor.id(), AgentId::RiskManagement);
        assert_eq!(advisor.cli_config.timeout, Duration::from_secs(5));
    }
}
