//! Advisors for tests and offline runs.
//!
//! `ScriptedAdvisor` returns a canned reply (or failure) after an optional
//! delay. `ScenarioAdvisor` reads the financial context and applies the same
//! priorities the role prompts describe, so end-to-end runs produce
//! realistic, context-dependent advice without calling a model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fincouncil_models::agent_message::{AgentId, AgentRequest, AgentResponse};
use rust_decimal::Decimal;

use crate::advisor::AdvisorAgent;
use crate::error::AgentError;
use crate::lexicon::format_amount;

enum Script {
    Reply(AgentResponse),
    Fail(String),
}

pub struct ScriptedAdvisor {
    agent: AgentId,
    script: Script,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAdvisor {
    pub fn replying(agent: AgentId, text: &str, confidence: Decimal) -> Self {
        let response = AgentResponse {
            agent,
            analysis_text: text.to_string(),
            confidence,
            stance: None,
            recommended_amount: None,
        };
        Self::with_response(response)
    }

    /// Reply with a fully specified response. Its `agent` may differ from the
    /// advisor's role, which the coordinator must correct.
    pub fn with_response(response: AgentResponse) -> Self {
        Self {
            agent: response.agent,
            script: Script::Reply(response),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(agent: AgentId, reason: &str) -> Self {
        Self {
            agent,
            script: Script::Fail(reason.to_string()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serve under a different role than the scripted response names.
    pub fn as_role(mut self, agent: AgentId) -> Self {
        self.agent = agent;
        self
    }

    /// Shared counter of `analyze` calls, readable after the advisor is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl AdvisorAgent for ScriptedAdvisor {
    fn id(&self) -> AgentId {
        self.agent
    }

    async fn analyze(&self, _request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Reply(response) => Ok(response.clone()),
            Script::Fail(reason) => Err(AgentError::Upstream(reason.clone())),
        }
    }
}

/// A rule-based advisor driven by numeric fields of the financial context:
/// `lump_sum` (or `bonus`), `debt`, `debt_interest_rate` and
/// `emergency_fund_months`.
pub struct ScenarioAdvisor {
    agent: AgentId,
}

impl ScenarioAdvisor {
    pub fn new(agent: AgentId) -> Self {
        Self { agent }
    }

    pub fn council() -> Vec<Arc<dyn AdvisorAgent>> {
        AgentId::ALL
            .iter()
            .map(|&agent| Arc::new(Self::new(agent)) as Arc<dyn AdvisorAgent>)
            .collect()
    }
}

fn context_amount(context: &serde_json::Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .filter_map(|key| context.get(*key))
        .find_map(|v| match v {
            serde_json::Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
            serde_json::Value::String(s) => s.parse::<Decimal>().ok(),
            _ => None,
        })
}

fn advise(agent: AgentId, context: &serde_json::Value) -> (String, Decimal) {
    let rupees = |amount: Decimal| format_amount("₹", amount);
    let lump_sum = context_amount(context, &["lump_sum", "bonus"]).unwrap_or(Decimal::ZERO);
    let debt = context_amount(context, &["debt"]).unwrap_or(Decimal::ZERO);
    let rate = context_amount(context, &["debt_interest_rate"]).unwrap_or(Decimal::ZERO);
    let cushion = context_amount(context, &["emergency_fund_months"]).unwrap_or(Decimal::ZERO);
    let to_debt = debt.min(lump_sum);
    let rest = lump_sum - to_debt;

    match agent {
        AgentId::Analyst if to_debt > Decimal::ZERO && rest > Decimal::ZERO => (
            format!("Clear {} debt, save {}.", rupees(to_debt), rupees(rest)),
            Decimal::new(80, 2),
        ),
        AgentId::Analyst if to_debt > Decimal::ZERO => (
            format!("Use the full {} to clear debt.", rupees(to_debt)),
            Decimal::new(80, 2),
        ),
        AgentId::Analyst => (
            format!("Save {} in a liquid fund until a goal is set.", rupees(lump_sum)),
            Decimal::new(65, 2),
        ),
        AgentId::Research if to_debt > Decimal::ZERO && rate >= Decimal::from(10) => {
            let text = if rest > Decimal::ZERO {
                format!(
                    "Clear {} debt, invest {} in equity.",
                    rupees(to_debt),
                    rupees(rest)
                )
            } else {
                format!("Clear {} debt; markets will not beat that rate.", rupees(to_debt))
            };
            (text, Decimal::new(75, 2))
        }
        AgentId::Research => (
            format!("Invest {} through an index fund SIP.", rupees(lump_sum)),
            Decimal::new(70, 2),
        ),
        AgentId::RiskManagement if cushion < Decimal::from(6) => (
            format!(
                "Build an emergency fund first, keep {} aside.",
                rupees(lump_sum)
            ),
            Decimal::new(85, 2),
        ),
        AgentId::RiskManagement if to_debt > Decimal::ZERO => (
            format!("Pay off {} debt first.", rupees(to_debt)),
            Decimal::new(85, 2),
        ),
        AgentId::RiskManagement => (
            format!("Keep {} in a fixed deposit for safety.", rupees(lump_sum)),
            Decimal::new(70, 2),
        ),
    }
}

#[async_trait]
impl AdvisorAgent for ScenarioAdvisor {
    fn id(&self) -> AgentId {
        self.agent
    }

    async fn analyze(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let (text, confidence) = advise(self.agent, &request.financial_context);
        Ok(AgentResponse {
            agent: self.agent,
            analysis_text: text,
            confidence,
            stance: None,
            recommended_amount: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn request(agent: AgentId, context: serde_json::Value) -> AgentRequest {
        AgentRequest {
            request_id: Uuid::nil(),
            session_id: "test".to_string(),
            agent,
            query: "what to do with my bonus".to_string(),
            financial_context: context,
        }
    }

    #[tokio::test]
    async fn scripted_advisor_counts_calls() {
        let advisor = ScriptedAdvisor::replying(AgentId::Analyst, "Save ₹5,000.", dec!(0.7));
        let calls = advisor.call_counter();
        let response = advisor
            .analyze(&request(AgentId::Analyst, serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.analysis_text, "Save ₹5,000.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scripted_failure() {
        let advisor = ScriptedAdvisor::failing(AgentId::Research, "503");
        let result = advisor
            .analyze(&request(AgentId::Research, serde_json::json!({})))
            .await;
        assert!(matches!(result, Err(AgentError::Upstream(_))));
    }

    #[tokio::test]
    async fn scenario_advisors_split_a_bonus() {
        let context = serde_json::json!({
            "bonus": 100000,
            "debt": 75000,
            "debt_interest_rate": 14,
            "emergency_fund_months": 6
        });
        let analyst = ScenarioAdvisor::new(AgentId::Analyst)
            .analyze(&request(AgentId::Analyst, context.clone()))
            .await
            .unwrap();
        assert_eq!(analyst.analysis_text, "Clear ₹75,000 debt, save ₹25,000.");

        let research = ScenarioAdvisor::new(AgentId::Research)
            .analyze(&request(AgentId::Research, context.clone()))
            .await
            .unwrap();
        assert_eq!(
            research.analysis_text,
            "Clear ₹75,000 debt, invest ₹25,000 in equity."
        );

        let risk = ScenarioAdvisor::new(AgentId::RiskManagement)
            .analyze(&request(AgentId::RiskManagement, context))
            .await
            .unwrap();
        assert_eq!(risk.analysis_text, "Pay off ₹75,000 debt first.");
    }
}
