use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::agent_message::AgentId;
use crate::error::ModelError;

/// A currency amount pulled out of free-form analysis text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedFigure {
    /// Value in base currency units. Never negative.
    pub amount: Decimal,
    /// The substring the amount was parsed from.
    pub raw_span: String,
    /// Byte offset of `raw_span` in the source text.
    pub offset: usize,
    /// Provenance. `None` until the figure is attributed to an agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
}

impl ExtractedFigure {
    pub fn attributed(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn end(&self) -> usize {
        self.offset + self.raw_span.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    NumericDivergence,
    DirectionalDisagreement,
    PriorityConflict,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictType::NumericDivergence => "numeric divergence",
            ConflictType::DirectionalDisagreement => "directional disagreement",
            ConflictType::PriorityConflict => "priority conflict",
        };
        f.write_str(s)
    }
}

/// A detected disagreement between two or more agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub conflict_type: ConflictType,
    pub participants: BTreeSet<AgentId>,
    /// Normalized disagreement size: 0 = none, 1 = maximal.
    pub magnitude: Decimal,
    pub description: String,
}

impl Conflict {
    /// Build a conflict. Participants are deduplicated and must number at least two;
    /// the magnitude is clamped into [0, 1].
    pub fn new(
        conflict_type: ConflictType,
        participants: impl IntoIterator<Item = AgentId>,
        magnitude: Decimal,
        description: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let participants: BTreeSet<AgentId> = participants.into_iter().collect();
        if participants.len() < 2 {
            return Err(ModelError::TooFewParticipants(participants.len()));
        }
        Ok(Self {
            conflict_type,
            participants,
            magnitude: magnitude.clamp(Decimal::ZERO, Decimal::ONE),
            description: description.into(),
        })
    }

    pub fn involves(&self, agent: AgentId) -> bool {
        self.participants.contains(&agent)
    }

    /// The two participants of a pairwise conflict, in `AgentId` order.
    pub fn pair(&self) -> Option<(AgentId, AgentId)> {
        let mut iter = self.participants.iter().copied();
        match (iter.next(), iter.next(), iter.next()) {
            (Some(a), Some(b), None) => Some((a, b)),
            _ => None,
        }
    }
}

/// Global agreement level across all responding agents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum ConsensusLevel {
    /// No conflicts among the responding agents.
    Unanimous,
    /// A single agent disagrees with an otherwise agreeing majority.
    Majority { dissenter: AgentId },
    /// Disagreement without a clear majority.
    Split,
    /// Fewer than two agents produced usable text.
    Insufficient,
}
