//! Picks the winning side of each conflict. Discussion narration and the
//! final answer both go through here so they always agree on the outcome.

use std::cmp::Ordering;

use fincouncil_models::agent_message::AgentId;
use fincouncil_models::config::CollaborationConfig;
use fincouncil_models::conflict::{Conflict, ConflictType};
use rust_decimal::Decimal;

use crate::detector::{divergence, AgentPosition};
use crate::lexicon;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionReason {
    /// The winning side had higher combined confidence.
    Confidence,
    /// Confidences tied; the winner disagreed less with the remaining agent.
    LowerMagnitude,
    /// Still tied; resolved toward risk management or the more conservative option.
    Conservative,
}

impl ResolutionReason {
    pub fn explain(self) -> &'static str {
        match self {
            ResolutionReason::Confidence => "higher combined confidence",
            ResolutionReason::LowerMagnitude => "a smaller disagreement with the remaining advisor",
            ResolutionReason::Conservative => "the more conservative option",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub conflict: Conflict,
    pub winner: AgentId,
    /// Participants that give way to the winner.
    pub conceded: Vec<AgentId>,
    /// Non-participants that side with the winner.
    pub backers: Vec<AgentId>,
    pub reason: ResolutionReason,
    /// The winning side holds more than half of the responding agents.
    pub majority: bool,
}

impl Resolution {
    /// Above threshold with no majority behind the outcome.
    pub fn is_unresolved(&self, threshold: Decimal) -> bool {
        self.conflict.magnitude > threshold && !self.majority
    }
}

struct Side {
    agent: AgentId,
    backers: Vec<AgentId>,
    confidence: Decimal,
}

pub struct Resolver<'a> {
    positions: &'a [AgentPosition],
    conflicts: &'a [Conflict],
    threshold: Decimal,
    symbol: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(
        positions: &'a [AgentPosition],
        conflicts: &'a [Conflict],
        config: &'a CollaborationConfig,
    ) -> Self {
        Self {
            positions,
            conflicts,
            threshold: config.conflict_threshold,
            symbol: config.display_symbol(),
        }
    }

    pub fn position(&self, agent: AgentId) -> Option<&'a AgentPosition> {
        self.positions.iter().find(|p| p.agent == agent)
    }

    /// `None` when fewer than two participants actually responded.
    pub fn resolve(&self, conflict: &Conflict) -> Option<Resolution> {
        let participants: Vec<&AgentPosition> = conflict
            .participants
            .iter()
            .filter_map(|&agent| self.position(agent))
            .collect();
        if participants.len() < 2 {
            return None;
        }

        let kind = conflict.conflict_type;
        let sides: Vec<Side> = participants
            .iter()
            .map(|p| {
                let rivals: Vec<&AgentPosition> = participants
                    .iter()
                    .copied()
                    .filter(|r| r.agent != p.agent)
                    .collect();
                let backers: Vec<&AgentPosition> = self
                    .positions
                    .iter()
                    .filter(|q| !conflict.involves(q.agent))
                    .filter(|q| aligned(q, p, rivals.iter().copied(), kind, self.threshold))
                    .collect();
                Side {
                    agent: p.agent,
                    confidence: p.confidence + backers.iter().map(|q| q.confidence).sum::<Decimal>(),
                    backers: backers.iter().map(|q| q.agent).collect(),
                }
            })
            .collect();

        let (index, reason) = self.decide(&sides, conflict);
        let side = &sides[index];
        let majority = (side.backers.len() + 1) * 2 > self.positions.len();

        Some(Resolution {
            conflict: conflict.clone(),
            winner: side.agent,
            conceded: sides
                .iter()
                .map(|s| s.agent)
                .filter(|&a| a != side.agent)
                .collect(),
            backers: side.backers.clone(),
            reason,
            majority,
        })
    }

    pub fn resolve_all(&self) -> Vec<Resolution> {
        self.conflicts.iter().filter_map(|c| self.resolve(c)).collect()
    }

    /// Whose recommendation leads the final answer: the winner of the largest
    /// conflict, or with no conflicts the most confident agent.
    pub fn overall_winner(&self) -> Option<AgentId> {
        if let Some(resolution) = self.conflicts.first().and_then(|c| self.resolve(c)) {
            return Some(resolution.winner);
        }
        self.positions
            .iter()
            .max_by(|a, b| {
                a.confidence
                    .cmp(&b.confidence)
                    .then_with(|| is_risk(a.agent).cmp(&is_risk(b.agent)))
                    .then(b.agent.cmp(&a.agent))
            })
            .map(|p| p.agent)
    }

    /// Responding agents with no conflict against `winner`.
    pub fn supporters(&self, winner: AgentId) -> Vec<AgentId> {
        self.positions
            .iter()
            .map(|p| p.agent)
            .filter(|&a| a != winner)
            .filter(|&a| !self.conflicts.iter().any(|c| c.involves(a) && c.involves(winner)))
            .collect()
    }

    /// Short rendering of what `agent` holds on the point in dispute.
    pub fn stated_position(&self, agent: AgentId, kind: ConflictType) -> String {
        let Some(position) = self.position(agent) else {
            return "no position".to_string();
        };
        let rendered = match kind {
            ConflictType::NumericDivergence => position
                .salient_amount()
                .map(|amount| lexicon::format_amount(self.symbol, amount)),
            ConflictType::DirectionalDisagreement => position.stance.map(|s| s.describe().to_string()),
            ConflictType::PriorityConflict => position
                .leading_priority
                .map(|s| format!("{} first", s.describe())),
        };
        rendered.unwrap_or_else(|| "its own approach".to_string())
    }

    fn decide(&self, sides: &[Side], conflict: &Conflict) -> (usize, ResolutionReason) {
        let mut candidates: Vec<usize> = (0..sides.len()).collect();

        let best = sides
            .iter()
            .map(|s| s.confidence)
            .max()
            .unwrap_or(Decimal::ZERO);
        candidates.retain(|&i| sides[i].confidence == best);
        if let [only] = candidates.as_slice() {
            return (*only, ResolutionReason::Confidence);
        }

        let remaining: Vec<AgentId> = self
            .positions
            .iter()
            .map(|p| p.agent)
            .filter(|&a| !conflict.involves(a))
            .collect();
        if !remaining.is_empty() {
            let against = |i: usize| self.magnitude_against(sides[i].agent, &remaining);
            let lowest = candidates
                .iter()
                .map(|&i| against(i))
                .min()
                .unwrap_or(Decimal::ZERO);
            candidates.retain(|&i| against(i) == lowest);
            if let [only] = candidates.as_slice() {
                return (*only, ResolutionReason::LowerMagnitude);
            }
        }

        let with_risk: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| is_risk(sides[i].agent) || sides[i].backers.iter().any(|&b| is_risk(b)))
            .collect();
        if let [only] = with_risk.as_slice() {
            return (*only, ResolutionReason::Conservative);
        }

        let kind = conflict.conflict_type;
        let pick = candidates
            .iter()
            .copied()
            .max_by(|&x, &y| {
                self.compare_conservatism(sides[x].agent, sides[y].agent, kind)
                    .then(y.cmp(&x))
            })
            .unwrap_or(0);
        (pick, ResolutionReason::Conservative)
    }

    fn magnitude_against(&self, agent: AgentId, others: &[AgentId]) -> Decimal {
        self.conflicts
            .iter()
            .filter(|c| c.involves(agent) && others.iter().any(|&o| c.involves(o)))
            .map(|c| c.magnitude)
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// `Greater` when `a` holds the more conservative position.
    fn compare_conservatism(&self, a: AgentId, b: AgentId, kind: ConflictType) -> Ordering {
        let (Some(pa), Some(pb)) = (self.position(a), self.position(b)) else {
            return Ordering::Equal;
        };
        match kind {
            ConflictType::NumericDivergence => match (pa.salient_amount(), pb.salient_amount()) {
                (Some(x), Some(y)) => y.cmp(&x),
                _ => Ordering::Equal,
            },
            ConflictType::DirectionalDisagreement => pa
                .stance
                .map(|s| s.conservatism())
                .cmp(&pb.stance.map(|s| s.conservatism())),
            ConflictType::PriorityConflict => pa
                .leading_priority
                .map(|s| s.conservatism())
                .cmp(&pb.leading_priority.map(|s| s.conservatism())),
        }
    }
}

fn is_risk(agent: AgentId) -> bool {
    agent == AgentId::RiskManagement
}

/// Whether `candidate` sides with `participant` on a conflict of `kind`.
/// For figures, the candidate must be within threshold and strictly closer to
/// the participant than to any rival.
pub(crate) fn aligned<'p>(
    candidate: &AgentPosition,
    participant: &AgentPosition,
    rivals: impl IntoIterator<Item = &'p AgentPosition>,
    kind: ConflictType,
    threshold: Decimal,
) -> bool {
    match kind {
        ConflictType::NumericDivergence => {
            let (Some(c), Some(p)) = (candidate.salient_amount(), participant.salient_amount())
            else {
                return false;
            };
            let own = divergence(c, p);
            own <= threshold
                && rivals
                    .into_iter()
                    .filter_map(|r| r.salient_amount())
                    .all(|r| own < divergence(c, r))
        }
        ConflictType::DirectionalDisagreement => {
            candidate.stance.is_some() && candidate.stance == participant.stance
        }
        ConflictType::PriorityConflict => {
            candidate.leading_priority.is_some()
                && candidate.leading_priority == participant.leading_priority
        }
    }
}
