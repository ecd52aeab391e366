use std::collections::BTreeSet;

use fincouncil_models::agent_message::{AgentId, AgentResponse, Stance};
use fincouncil_models::config::CollaborationConfig;
use fincouncil_models::conflict::Conflict;
use rust_decimal::Decimal;
use tracing::debug;

use crate::detector::{AgentPosition, ConflictDetector, ConflictReport};
use crate::lexicon;
use crate::resolver::{Resolution, Resolver};

/// Most clauses quoted from a single agent.
const MAX_CLAUSES: usize = 6;

/// Confidence ceiling when no response addresses the query.
const LOW_RELEVANCE_CAP: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Penalty per conflict left unresolved above threshold.
const UNRESOLVED_PENALTY: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Never empty.
    pub final_answer: String,
    /// In [0, 1].
    pub overall_confidence: Decimal,
    pub low_relevance: bool,
    pub winner: Option<AgentId>,
    pub resolutions: Vec<Resolution>,
}

/// Merges the agents' analyses and the detected conflicts into one answer.
pub struct ConsensusSynthesizer {
    detector: ConflictDetector,
}

struct Clause<'t> {
    text: &'t str,
    amounts: Vec<Decimal>,
    stance: Option<Stance>,
}

impl ConsensusSynthesizer {
    pub fn new(config: &CollaborationConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            detector: ConflictDetector::new(config)?,
        })
    }

    pub fn synthesize(&self, query: &str, responses: &[AgentResponse], conflicts: &[Conflict]) -> Synthesis {
        let positions = self.detector.positions(responses);
        self.compose(query, responses, &positions, conflicts, &[])
    }

    /// Like [`synthesize`](Self::synthesize), also reporting demoted notes.
    pub fn synthesize_report(
        &self,
        query: &str,
        responses: &[AgentResponse],
        report: &ConflictReport,
    ) -> Synthesis {
        let positions = self.detector.positions(responses);
        self.compose(query, responses, &positions, &report.conflicts, &report.notes)
    }

    pub(crate) fn compose(
        &self,
        query: &str,
        responses: &[AgentResponse],
        positions: &[AgentPosition],
        conflicts: &[Conflict],
        notes: &[Conflict],
    ) -> Synthesis {
        let config = self.detector.config();
        let query = query.trim();

        if positions.is_empty() {
            return Synthesis {
                final_answer: format!(
                    "Insufficient information: none of the advisors produced a usable analysis for \"{query}\". \
                     Please try again, or add detail about your income, savings and obligations."
                ),
                overall_confidence: Decimal::ZERO,
                low_relevance: false,
                winner: None,
                resolutions: Vec::new(),
            };
        }

        let resolver = Resolver::new(positions, conflicts, config);
        let resolutions = resolver.resolve_all();
        let unresolved = resolutions
            .iter()
            .filter(|r| r.is_unresolved(config.conflict_threshold))
            .count();
        let mut confidence = overall_confidence(responses, unresolved);

        if !self.is_relevant(query, positions) {
            debug!(query, "No analysis addresses the query");
            confidence = confidence.min(LOW_RELEVANCE_CAP);
            return Synthesis {
                final_answer: low_relevance_answer(query, positions),
                overall_confidence: confidence,
                low_relevance: true,
                winner: None,
                resolutions,
            };
        }

        let Some(winner) = resolver
            .overall_winner()
            .and_then(|agent| resolver.position(agent))
        else {
            return Synthesis {
                final_answer: "Insufficient information: no advisor recommendation could be selected."
                    .to_string(),
                overall_confidence: Decimal::ZERO,
                low_relevance: false,
                winner: None,
                resolutions,
            };
        };

        let mut lines = vec![format!("Answer: {}", best_sentence(query, winner))];
        lines.extend(self.recommendation(winner, &resolver));
        for resolution in &resolutions {
            lines.push(resolution_line(&resolver, resolution, config.conflict_threshold));
        }
        for note in notes {
            lines.push(format!("Also noted: {}.", note.description));
        }
        if let Some(note) = missing_note(positions) {
            lines.push(note);
        }

        Synthesis {
            final_answer: lines.join("\n"),
            overall_confidence: confidence,
            low_relevance: false,
            winner: Some(winner.agent),
            resolutions,
        }
    }

    /// Relevant when a response shares a salient term or an amount with the
    /// query, or its figures add up to an amount in the query.
    fn is_relevant(&self, query: &str, positions: &[AgentPosition]) -> bool {
        let query_terms = lexicon::salient_terms(query);
        let query_amounts = self.detector.extractor().amounts(query);
        if query_terms.is_empty() && query_amounts.is_empty() {
            return true;
        }
        let tolerance = self.detector.config().complementary_tolerance;
        let matches_query = |amount: Decimal| {
            query_amounts
                .iter()
                .any(|&q| (amount - q).abs() <= tolerance * q)
        };

        let relevant = positions.iter().any(|p| {
            let terms = lexicon::salient_terms(&p.text);
            if !terms.is_disjoint(&query_terms) {
                return true;
            }
            let amounts: Vec<Decimal> = p.figures.iter().map(|f| f.amount).collect();
            amounts.iter().any(|&a| matches_query(a))
                || pair_sums(&amounts).any(matches_query)
                || matches_query(amounts.iter().copied().sum())
        });
        if relevant {
            return true;
        }

        let salient: Vec<Decimal> = positions.iter().filter_map(|p| p.salient_amount()).collect();
        let split_matches = pair_sums(&salient).any(matches_query);
        split_matches
    }

    /// "Recommendation" block: the winner's actionable clauses, then clauses
    /// from agreeing agents that add figures the winner does not cover.
    fn recommendation(&self, winner: &AgentPosition, resolver: &Resolver<'_>) -> Vec<String> {
        let supporters = resolver.supporters(winner.agent);
        let mut header = format!("Recommendation ({}", winner.agent.label());
        if !supporters.is_empty() {
            let names: Vec<&str> = supporters.iter().map(|a| a.label()).collect();
            header.push_str(&format!(", backed by {}", names.join(" and ")));
        }
        header.push_str("):");

        let winner_clauses = actionable_clauses(winner);
        let mut covered: Vec<(Decimal, Option<Stance>)> = winner_clauses
            .iter()
            .flat_map(|c| c.amounts.iter().map(move |&a| (a, c.stance)))
            .collect();

        let mut lines = vec![header];
        lines.extend(winner_clauses.iter().map(|c| format!("- {}", c.text)));

        let mut alternatives = Vec::new();
        for agent in &supporters {
            let Some(position) = resolver.position(*agent) else {
                continue;
            };
            for clause in actionable_clauses(position) {
                if clause.amounts.is_empty() {
                    continue;
                }
                let uncovered = clause
                    .amounts
                    .iter()
                    .any(|a| !covered.iter().any(|(c, _)| c == a));
                if uncovered {
                    lines.push(format!("- {} ({})", clause.text, agent.label()));
                    covered.extend(clause.amounts.iter().map(|&a| (a, clause.stance)));
                    continue;
                }
                let differs = clause.stance.is_some()
                    && clause.amounts.iter().any(|a| {
                        covered
                            .iter()
                            .any(|(c, stance)| c == a && *stance != clause.stance)
                    });
                if differs {
                    alternatives.push(format!("Alternative from {}: {}", agent.label(), clause.text));
                }
            }
        }
        lines.extend(alternatives);
        lines
    }
}

/// Equal-weight mean over all three roles (absent or unusable responses count
/// as zero), less a penalty per unresolved conflict.
fn overall_confidence(responses: &[AgentResponse], unresolved: usize) -> Decimal {
    let total: Decimal = AgentId::ALL
        .iter()
        .filter_map(|&agent| responses.iter().find(|r| r.agent == agent && r.is_usable()))
        .map(|r| r.confidence.clamp(Decimal::ZERO, Decimal::ONE))
        .sum();
    let mean = total / Decimal::from(AgentId::ALL.len());
    let penalty = UNRESOLVED_PENALTY * Decimal::from(unresolved);
    (mean - penalty).clamp(Decimal::ZERO, Decimal::ONE)
}

fn pair_sums(amounts: &[Decimal]) -> impl Iterator<Item = Decimal> + '_ {
    amounts.iter().enumerate().flat_map(move |(i, &a)| {
        amounts[i + 1..]
            .iter()
            .filter_map(move |&b| a.checked_add(b))
    })
}

fn actionable_clauses(position: &AgentPosition) -> Vec<Clause<'_>> {
    let text = position.text.as_str();
    lexicon::clause_spans(text)
        .into_iter()
        .filter_map(|(start, end)| {
            let words = lexicon::words(&text[start..end]);
            let amounts: Vec<Decimal> = position
                .figures
                .iter()
                .filter(|f| f.offset >= start && f.offset < end)
                .map(|f| f.amount)
                .collect();
            let stance = lexicon::clause_stances(&words).first().copied();
            let actionable = stance.is_some()
                || words.iter().any(|w| lexicon::is_action_verb(&w.text));
            actionable.then(|| Clause {
                text: &text[start..end],
                amounts,
                stance,
            })
        })
        .take(MAX_CLAUSES)
        .collect()
}

/// The winner's sentence sharing the most salient terms with the query.
fn best_sentence<'p>(query: &str, winner: &'p AgentPosition) -> &'p str {
    let query_terms = lexicon::salient_terms(query);
    let text = winner.text.as_str();
    lexicon::sentence_spans(text)
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .enumerate()
        .max_by_key(|(i, sentence)| {
            let shared = lexicon::salient_terms(sentence).intersection(&query_terms).count();
            (shared, std::cmp::Reverse(*i))
        })
        .map(|(_, sentence)| sentence)
        .unwrap_or_else(|| winner.headline())
}

fn resolution_line(resolver: &Resolver<'_>, resolution: &Resolution, threshold: Decimal) -> String {
    let kind = resolution.conflict.conflict_type;
    let conceded: Vec<String> = resolution
        .conceded
        .iter()
        .map(|&agent| format!("{}'s {}", agent.label(), resolver.stated_position(agent, kind)))
        .collect();
    let verdict = format!(
        "went with {}'s {} over {} on {}",
        resolution.winner.label(),
        resolver.stated_position(resolution.winner, kind),
        conceded.join(" and "),
        resolution.reason.explain()
    );
    if resolution.is_unresolved(threshold) {
        format!(
            "Open {kind}: {}. Tentatively {verdict}; the advisors remain split.",
            resolution.conflict.description
        )
    } else {
        format!("Resolved {kind}: {}. We {verdict}.", resolution.conflict.description)
    }
}

fn low_relevance_answer(query: &str, positions: &[AgentPosition]) -> String {
    let covered: BTreeSet<String> = positions
        .iter()
        .filter_map(|p| p.stance)
        .map(|s| s.describe().to_string())
        .collect();
    let focus = if covered.is_empty() {
        String::new()
    } else {
        format!(" They focused on {}.", covered.into_iter().collect::<Vec<_>>().join(" and "))
    };
    format!(
        "Low relevance: the advisors' analyses do not address your question (\"{query}\").{focus} \
         Could you clarify what you would like help with, for example the amount involved and your goal?"
    )
}

fn missing_note(positions: &[AgentPosition]) -> Option<String> {
    let missing: Vec<&str> = AgentId::ALL
        .iter()
        .filter(|&&agent| !positions.iter().any(|p| p.agent == agent))
        .map(|agent| agent.label())
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(format!(
        "Note: no usable analysis from {}; this answer draws on the remaining advisors.",
        missing.join(" and ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn synthesizer() -> ConsensusSynthesizer {
        ConsensusSynthesizer::new(&CollaborationConfig::default()).unwrap()
    }

    fn detector() -> ConflictDetector {
        ConflictDetector::new(&CollaborationConfig::default()).unwrap()
    }

    fn response(agent: AgentId, text: &str, confidence: Decimal) -> AgentResponse {
        AgentResponse::new(agent, text, confidence).unwrap()
    }

    #[test]
    fn nothing_usable_is_insufficient() {
        let responses: Vec<AgentResponse> =
            AgentId::ALL.iter().map(|&a| AgentResponse::placeholder(a)).collect();
        let synthesis = synthesizer().synthesize("what should I do?", &responses, &[]);
        assert!(synthesis.final_answer.starts_with("Insufficient information"));
        assert_eq!(synthesis.overall_confidence, Decimal::ZERO);

        let synthesis = synthesizer().synthesize("", &[], &[]);
        assert!(!synthesis.final_answer.is_empty());
        assert_eq!(synthesis.overall_confidence, Decimal::ZERO);
    }

    #[test]
    fn whitespace_only_text_is_unusable() {
        let responses = vec![response(AgentId::Analyst, "   \n ", dec!(0.9))];
        let synthesis = synthesizer().synthesize("car budget", &responses, &[]);
        assert!(synthesis.final_answer.starts_with("Insufficient information"));
    }

    #[test]
    fn off_topic_answers_ask_for_clarification() {
        let responses = vec![
            response(AgentId::Analyst, "Pay off your credit card dues first.", dec!(0.9)),
            response(AgentId::Research, "Clear the personal loan before anything else.", dec!(0.9)),
            response(AgentId::RiskManagement, "Reduce your debts to lower interest costs.", dec!(0.9)),
        ];
        let synthesis = synthesizer().synthesize("what is my budget for a car", &responses, &[]);
        assert!(synthesis.low_relevance);
        assert!(synthesis.final_answer.starts_with("Low relevance"));
        assert!(synthesis.final_answer.contains("clarify"));
        assert!(synthesis.overall_confidence <= dec!(0.5));
    }

    #[test]
    fn shared_amount_counts_as_relevant() {
        let responses = vec![response(
            AgentId::Analyst,
            "Put ₹1,00,000 into a liquid fund.",
            dec!(0.8),
        )];
        let synthesis = synthesizer().synthesize("₹1 lakh sitting idle", &responses, &[]);
        assert!(!synthesis.low_relevance);
        assert!(synthesis.final_answer.contains("₹1,00,000"));
    }

    #[test]
    fn split_across_advisors_counts_as_relevant() {
        let responses = vec![
            response(AgentId::Analyst, "Clear ₹75,000 of card dues.", dec!(0.8)),
            response(AgentId::Research, "Park ₹25,000 in a liquid fund.", dec!(0.8)),
        ];
        let synthesis =
            synthesizer().synthesize("How should I use a ₹1,00,000 windfall?", &responses, &[]);
        assert!(!synthesis.low_relevance);
        assert!(!synthesis.final_answer.starts_with("Low relevance"));
    }

    #[test]
    fn bonus_split_answer() {
        let responses = vec![
            response(AgentId::Analyst, "Clear ₹75,000 debt, save ₹25,000.", dec!(0.85)),
            response(
                AgentId::Research,
                "Clear ₹75,000 debt, invest ₹25,000 in equity.",
                dec!(0.8),
            ),
            response(AgentId::RiskManagement, "Pay off ₹75,000 debt first.", dec!(0.8)),
        ];
        let report = detector().analyze(&responses, &[dec!(100000)]);
        let synthesis = synthesizer().synthesize_report(
            "what to do with a ₹1,00,000 bonus",
            &responses,
            &report,
        );
        assert!(!synthesis.low_relevance);
        assert_eq!(synthesis.winner, Some(AgentId::Analyst));
        assert!(synthesis.final_answer.contains("₹75,000 debt"));
        assert!(synthesis.final_answer.contains("₹25,000"));
        assert!(synthesis.final_answer.contains("Alternative from Research Strategist"));
        assert!(synthesis.overall_confidence >= dec!(0.7));

        let answer = synthesis.final_answer;
        let answer_at = answer.find("Answer:").unwrap();
        let recommendation_at = answer.find("Recommendation").unwrap();
        assert!(answer_at < recommendation_at);
    }

    #[test]
    fn conflicts_are_explained_after_the_recommendation() {
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car.", dec!(0.9)),
            response(AgentId::Research, "Budget ₹2,10,000 for the car.", dec!(0.6)),
            response(AgentId::RiskManagement, "Budget ₹5,00,000 for the car.", dec!(0.7)),
        ];
        let conflicts = detector().detect(&responses);
        let synthesis = synthesizer().synthesize("car budget", &responses, &conflicts);
        let answer = &synthesis.final_answer;
        let recommendation_at = answer.find("Recommendation").unwrap();
        let resolved_at = answer.find("Resolved numeric divergence").unwrap();
        assert!(recommendation_at < resolved_at);
        assert!(answer.contains("₹2,00,000"));
        // Both conflicts have a majority behind the winner.
        assert_eq!(synthesis.overall_confidence.round_dp(2), dec!(0.73));
    }

    #[test]
    fn unresolved_conflicts_lower_confidence() {
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car.", dec!(0.9)),
            response(AgentId::RiskManagement, "Budget ₹5,00,000 for the car.", dec!(0.9)),
        ];
        let conflicts = detector().detect(&responses);
        let synthesis = synthesizer().synthesize("car budget", &responses, &conflicts);
        assert_eq!(synthesis.overall_confidence, dec!(0.5));
        assert!(synthesis.final_answer.contains("Open numeric divergence"));
        assert!(synthesis
            .final_answer
            .contains("no usable analysis from Research Strategist"));
    }

    #[test]
    fn confidence_stays_in_range() {
        let mut conflicts = Vec::new();
        for _ in 0..12 {
            conflicts.push(
                Conflict::new(
                    fincouncil_models::conflict::ConflictType::NumericDivergence,
                    [AgentId::Analyst, AgentId::Research],
                    dec!(0.9),
                    "figures differ",
                )
                .unwrap(),
            );
        }
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car.", dec!(0.2)),
            response(AgentId::Research, "Budget ₹5,00,000 for the car.", dec!(0.2)),
        ];
        let synthesis = synthesizer().synthesize("car budget", &responses, &conflicts);
        assert_eq!(synthesis.overall_confidence, Decimal::ZERO);
        assert!(!synthesis.final_answer.is_empty());
    }

    #[test]
    fn every_subset_of_responders_gets_an_answer() {
        let all = [
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car.", dec!(0.8)),
            response(AgentId::Research, "Invest ₹50,000 in an index fund.", dec!(0.6)),
            response(AgentId::RiskManagement, "Keep six months of expenses aside.", dec!(0.9)),
        ];
        let synth = synthesizer();
        let d = detector();
        for mask in 0..8u8 {
            let responses: Vec<AgentResponse> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, r)| r.clone())
                .collect();
            let conflicts = d.detect(&responses);
            let synthesis = synth.synthesize("how should I budget for a car", &responses, &conflicts);
            assert!(!synthesis.final_answer.trim().is_empty());
            assert!(synthesis.overall_confidence >= Decimal::ZERO);
            assert!(synthesis.overall_confidence <= Decimal::ONE);
        }
    }
}
