use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// The three advisory roles that take part in every collaboration session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    /// Financial-data analyst.
    Analyst,
    /// Market-research strategist.
    Research,
    /// Risk/protection guardian.
    RiskManagement,
}

impl AgentId {
    pub const ALL: [AgentId; 3] = [AgentId::Analyst, AgentId::Research, AgentId::RiskManagement];

    /// Stable slot index used for the fan-out write slots.
    pub fn index(self) -> usize {
        match self {
            AgentId::Analyst => 0,
            AgentId::Research => 1,
            AgentId::RiskManagement => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::Analyst => "analyst",
            AgentId::Research => "research",
            AgentId::RiskManagement => "risk_management",
        }
    }

    /// Human-facing name used in synthesized prose.
    pub fn label(self) -> &'static str {
        match self {
            AgentId::Analyst => "Financial Analyst",
            AgentId::Research => "Research Strategist",
            AgentId::RiskManagement => "Risk Guardian",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional stance of a recommendation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Pay off or pay down debt.
    ReduceDebt,
    /// Put money into markets (equity, funds, SIPs).
    Invest,
    /// Save, build an emergency fund, insure.
    Preserve,
    /// Spend on a purchase.
    Spend,
}

impl Stance {
    /// Two stances are mutually exclusive uses of the same money unless both
    /// are conservative (debt reduction and preservation go together).
    pub fn excludes(self, other: Stance) -> bool {
        if self == other {
            return false;
        }
        !matches!(
            (self, other),
            (Stance::ReduceDebt, Stance::Preserve) | (Stance::Preserve, Stance::ReduceDebt)
        )
    }

    /// Higher is more conservative. Used to break ties toward the protective option.
    pub fn conservatism(self) -> u8 {
        match self {
            Stance::Preserve => 3,
            Stance::ReduceDebt => 2,
            Stance::Invest => 1,
            Stance::Spend => 0,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Stance::ReduceDebt => "paying down debt",
            Stance::Invest => "investing in markets",
            Stance::Preserve => "saving and protecting capital",
            Stance::Spend => "spending on the purchase",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Request sent to an advisor agent (serialized as JSON for the model call).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRequest {
    pub request_id: Uuid,
    pub session_id: String,
    pub agent: AgentId,
    pub query: String,
    /// Opaque financial context supplied by the caller.
    pub financial_context: serde_json::Value,
}

/// One advisor's output for one query. Immutable once collected into a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub agent: AgentId,
    pub analysis_text: String,
    /// 0.0 to 1.0 self-reported confidence. Defaults to 0.5 when the agent omits it.
    #[serde(default = "default_confidence")]
    pub confidence: Decimal,
    /// Structured stance, when the agent reports one directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<Stance>,
    /// Structured headline amount, when the agent reports one directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_amount: Option<Decimal>,
}

pub fn default_confidence() -> Decimal {
    Decimal::new(5, 1)
}

impl AgentResponse {
    pub fn new(
        agent: AgentId,
        analysis_text: impl Into<String>,
        confidence: Decimal,
    ) -> Result<Self, ModelError> {
        if confidence < Decimal::ZERO || confidence > Decimal::ONE {
            return Err(ModelError::ConfidenceOutOfRange(confidence.to_string()));
        }
        Ok(Self {
            agent,
            analysis_text: analysis_text.into(),
            confidence,
            stance: None,
            recommended_amount: None,
        })
    }

    /// Stand-in for an agent that failed or timed out.
    pub fn placeholder(agent: AgentId) -> Self {
        Self {
            agent,
            analysis_text: String::new(),
            confidence: Decimal::ZERO,
            stance: None,
            recommended_amount: None,
        }
    }

    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = Some(stance);
        self
    }

    pub fn with_recommended_amount(mut self, amount: Decimal) -> Self {
        self.recommended_amount = Some(amount);
        self
    }

    /// Clamp the confidence into [0, 1]. Used on model output, which is not trusted.
    pub fn clamp_confidence(mut self) -> Self {
        self.confidence = self.confidence.clamp(Decimal::ZERO, Decimal::ONE);
        self
    }

    /// Whether the agent produced any text worth analysing.
    pub fn is_usable(&self) -> bool {
        !self.analysis_text.trim().is_empty()
    }
}
