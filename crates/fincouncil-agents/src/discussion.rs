use std::collections::BTreeSet;

use fincouncil_models::agent_message::{AgentId, AgentResponse};
use fincouncil_models::config::CollaborationConfig;
use fincouncil_models::conflict::Conflict;
use fincouncil_models::session::DiscussionTurn;

use crate::detector::{AgentPosition, ConflictDetector};
use crate::resolver::{Resolution, Resolver};

/// Narrates how detected conflicts are worked through, as a short scripted
/// exchange. Output is deterministic and always ends on the same outcome the
/// synthesizer picks.
pub struct DiscussionSimulator {
    detector: ConflictDetector,
}

impl DiscussionSimulator {
    pub fn new(config: &CollaborationConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            detector: ConflictDetector::new(config)?,
        })
    }

    pub fn simulate(&self, conflicts: &[Conflict], responses: &[AgentResponse]) -> Vec<DiscussionTurn> {
        if conflicts.is_empty() {
            return Vec::new();
        }
        let positions = self.detector.positions(responses);
        self.simulate_positions(conflicts, &positions)
    }

    pub fn simulate_positions(
        &self,
        conflicts: &[Conflict],
        positions: &[AgentPosition],
    ) -> Vec<DiscussionTurn> {
        if conflicts.is_empty() {
            return Vec::new();
        }

        let config = self.detector.config();
        let resolver = Resolver::new(positions, conflicts, config);
        let cap = config.max_discussion_rounds.max(1) as usize;
        let rounds = (conflicts.len() + 1).min(cap) as u32;
        let mut turns = Vec::new();

        let speakers: BTreeSet<AgentId> = conflicts
            .iter()
            .flat_map(|c| c.participants.iter().copied())
            .filter(|&a| resolver.position(a).is_some())
            .collect();
        for agent in speakers {
            if let Some(position) = resolver.position(agent) {
                push(&mut turns, 1, agent, format!("My position: {}.", position.headline()));
            }
        }

        for (i, conflict) in conflicts.iter().enumerate() {
            let Some(resolution) = resolver.resolve(conflict) else {
                continue;
            };
            let round = if rounds >= 2 {
                2 + (i as u32).min(rounds - 2)
            } else {
                1
            };
            self.narrate(&mut turns, round, &resolver, &resolution);
        }

        if let Some(winner) = resolver.overall_winner() {
            if let Some(position) = resolver.position(winner) {
                push(
                    &mut turns,
                    rounds,
                    winner,
                    format!(
                        "Where we landed: we go with {}, starting from \"{}\".",
                        position.agent.label(),
                        position.headline()
                    ),
                );
            }
        }

        turns
    }

    fn narrate(
        &self,
        turns: &mut Vec<DiscussionTurn>,
        round: u32,
        resolver: &Resolver<'_>,
        resolution: &Resolution,
    ) {
        let kind = resolution.conflict.conflict_type;
        let winning = resolver.stated_position(resolution.winner, kind);

        let backing = if resolution.backers.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = resolution.backers.iter().map(|a| a.label()).collect();
            format!(" {} agrees with me.", names.join(" and "))
        };
        push(
            turns,
            round,
            resolution.winner,
            format!(
                "On the {kind}, I stand by {winning}.{backing} It carries on {}.",
                resolution.reason.explain()
            ),
        );

        for &agent in &resolution.conceded {
            let own = resolver.stated_position(agent, kind);
            let statement = if resolution.majority {
                format!(
                    "I accept {winning} from {} over my {own}.",
                    resolution.winner.label()
                )
            } else {
                format!(
                    "I still see merit in {own}, but I will defer to {} on {winning}.",
                    resolution.winner.label()
                )
            };
            push(turns, round, agent, statement);
        }
    }
}

fn push(turns: &mut Vec<DiscussionTurn>, round: u32, speaker: AgentId, statement: String) {
    if let Ok(turn) = DiscussionTurn::new(round, speaker, statement) {
        turns.push(turn);
    }
}
