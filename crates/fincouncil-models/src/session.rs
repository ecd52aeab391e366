use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::agent_message::{AgentId, AgentResponse};
use crate::conflict::{Conflict, ConsensusLevel};
use crate::error::ModelError;

pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// One synthetic exchange in the discussion transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscussionTurn {
    /// 1-based round number, non-decreasing within a transcript.
    pub round_index: u32,
    pub speaker: AgentId,
    pub statement: String,
}

impl DiscussionTurn {
    pub fn new(
        round_index: u32,
        speaker: AgentId,
        statement: impl Into<String>,
    ) -> Result<Self, ModelError> {
        if round_index == 0 {
            return Err(ModelError::InvalidRound(round_index));
        }
        Ok(Self {
            round_index,
            speaker,
            statement: statement.into(),
        })
    }
}

/// Pipeline stage of a collaboration session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Collecting,
    DetectingConflicts,
    Discussing,
    Synthesizing,
    Done,
}

impl SessionStage {
    /// Forward-only transitions. `Discussing` may be skipped; nothing is revisited.
    pub fn can_advance_to(self, next: SessionStage) -> bool {
        matches!(
            (self, next),
            (SessionStage::Collecting, SessionStage::DetectingConflicts)
                | (SessionStage::DetectingConflicts, SessionStage::Discussing)
                | (SessionStage::DetectingConflicts, SessionStage::Synthesizing)
                | (SessionStage::Discussing, SessionStage::Synthesizing)
                | (SessionStage::Synthesizing, SessionStage::Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionStage::Done
    }
}

/// How an individual agent call ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Succeeded,
    /// Served from the process-scoped response cache.
    Cached,
    TimedOut,
    Failed { reason: String },
}

/// Per-agent collection metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentReport {
    pub agent: AgentId,
    pub outcome: AgentOutcome,
    pub elapsed_ms: u64,
}

/// The aggregate result of one collaboration run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollaborationSession {
    pub session_id: String,
    pub schema_version: u32,
    pub user_query: String,
    /// One response per agent, in `AgentId` order. Failed agents hold placeholders.
    pub responses: Vec<AgentResponse>,
    /// Sorted by descending magnitude.
    pub conflicts: Vec<Conflict>,
    /// Disagreements demoted during deduplication, kept for the synthesizer.
    #[serde(default)]
    pub conflict_notes: Vec<Conflict>,
    pub consensus: ConsensusLevel,
    pub discussion: Vec<DiscussionTurn>,
    pub final_answer: String,
    pub overall_confidence: Decimal,
    /// Set when no response addressed the query and clarification was requested.
    #[serde(default)]
    pub low_relevance: bool,
    /// Stages traversed, ending in `done`.
    pub stages: Vec<SessionStage>,
    pub agent_reports: Vec<AgentReport>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CollaborationSession {
    pub fn response(&self, agent: AgentId) -> Option<&AgentResponse> {
        self.responses.iter().find(|r| r.agent == agent)
    }

    pub fn is_done(&self) -> bool {
        self.stages.last().is_some_and(|s| s.is_terminal())
    }
}
