use std::collections::BTreeSet;

use fincouncil_models::agent_message::{AgentId, AgentResponse, Stance};
use fincouncil_models::config::CollaborationConfig;
use fincouncil_models::conflict::{Conflict, ConflictType, ConsensusLevel, ExtractedFigure};
use rust_decimal::Decimal;
use tracing::debug;

use crate::extractor::AmountExtractor;
use crate::lexicon::{self, Topic};
use crate::resolver;

/// What one agent is recommending, read out of its response.
#[derive(Debug, Clone)]
pub struct AgentPosition {
    pub agent: AgentId,
    pub confidence: Decimal,
    /// Every figure in the text, in reading order.
    pub figures: Vec<ExtractedFigure>,
    /// The headline figure: structured amount, else the first figure in an
    /// action context, else the largest.
    pub salient: Option<ExtractedFigure>,
    pub stance: Option<Stance>,
    pub mentioned: BTreeSet<Stance>,
    pub leading_priority: Option<Stance>,
    pub(crate) topics: BTreeSet<Topic>,
    pub(crate) text: String,
}

impl AgentPosition {
    pub fn salient_amount(&self) -> Option<Decimal> {
        self.salient.as_ref().map(|f| f.amount)
    }

    /// The clause that best states this agent's recommendation, quoted from its own text.
    pub fn headline(&self) -> &str {
        let text = self.text.as_str();
        if let Some(figure) = &self.salient {
            if text.get(figure.offset..figure.end()) == Some(figure.raw_span.as_str()) {
                let (start, end) = lexicon::enclosing_clause(text, figure.offset, figure.end());
                return text[start..end].trim();
            }
        }
        lexicon::clause_spans(text)
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .find(|clause| {
                let words = lexicon::words(clause);
                words.iter().any(|w| lexicon::is_action_verb(&w.text))
                    || !lexicon::clause_stances(&words).is_empty()
            })
            .or_else(|| {
                lexicon::sentence_spans(text)
                    .first()
                    .map(|&(start, end)| &text[start..end])
            })
            .unwrap_or_else(|| text.trim())
    }
}

/// Output of one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReport {
    /// At most one conflict per agent pair, by descending magnitude.
    pub conflicts: Vec<Conflict>,
    /// Lower-magnitude disagreements for a pair that already has a conflict.
    pub notes: Vec<Conflict>,
    pub consensus: ConsensusLevel,
}

pub struct ConflictDetector {
    extractor: AmountExtractor,
    config: CollaborationConfig,
}

impl ConflictDetector {
    pub fn new(config: &CollaborationConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            extractor: AmountExtractor::new(config)?,
            config: config.clone(),
        })
    }

    pub fn extractor(&self) -> &AmountExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &CollaborationConfig {
        &self.config
    }

    /// Conflicts between the responses, sorted by descending magnitude.
    /// An empty list means the agents agree.
    pub fn detect(&self, responses: &[AgentResponse]) -> Vec<Conflict> {
        self.analyze(responses, &[]).conflicts
    }

    /// Full detection pass. `reference_totals` are amounts stated outside the
    /// responses (the query, the financial context) that complementary
    /// figures may add up to.
    pub fn analyze(&self, responses: &[AgentResponse], reference_totals: &[Decimal]) -> ConflictReport {
        let positions = self.positions(responses);
        self.analyze_positions(&positions, reference_totals)
    }

    /// Positions for usable responses, one per agent, in input order.
    pub fn positions(&self, responses: &[AgentResponse]) -> Vec<AgentPosition> {
        let mut seen = BTreeSet::new();
        responses
            .iter()
            .filter(|r| r.is_usable() && seen.insert(r.agent))
            .map(|r| self.position(r))
            .collect()
    }

    pub fn analyze_positions(
        &self,
        positions: &[AgentPosition],
        reference_totals: &[Decimal],
    ) -> ConflictReport {
        let mut totals: Vec<Decimal> = reference_totals.to_vec();
        for position in positions {
            totals.extend(position.figures.iter().map(|f| f.amount));
            totals.extend(position.salient_amount());
        }

        let mut conflicts = Vec::new();
        let mut notes = Vec::new();
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                let mut candidates = self.pair_conflicts(a, b, &totals);
                if candidates.is_empty() {
                    continue;
                }
                candidates.sort_by(|x, y| {
                    y.magnitude
                        .cmp(&x.magnitude)
                        .then(x.conflict_type.cmp(&y.conflict_type))
                });
                let mut candidates = candidates.into_iter();
                conflicts.extend(candidates.next());
                notes.extend(candidates);
            }
        }

        sort_conflicts(&mut conflicts);
        sort_conflicts(&mut notes);
        let consensus = self.consensus(positions, &conflicts);
        debug!(
            conflicts = conflicts.len(),
            notes = notes.len(),
            ?consensus,
            "Conflict detection complete"
        );

        ConflictReport {
            conflicts,
            notes,
            consensus,
        }
    }

    fn position(&self, response: &AgentResponse) -> AgentPosition {
        let text = response.analysis_text.as_str();
        let figures: Vec<ExtractedFigure> = self
            .extractor
            .extract(text)
            .into_iter()
            .map(|f| f.attributed(response.agent))
            .collect();

        let salient = match response.recommended_amount {
            Some(amount) => Some(ExtractedFigure {
                amount,
                raw_span: lexicon::format_amount(self.config.display_symbol(), amount),
                offset: 0,
                agent: Some(response.agent),
            }),
            None => figures
                .iter()
                .find(|f| self.in_action_context(text, f))
                .or_else(|| figures.iter().rev().max_by_key(|f| f.amount))
                .cloned(),
        };

        let mut profile = lexicon::stance_profile(text);
        if let Some(stance) = response.stance {
            profile.primary = Some(stance);
            profile.mentioned.insert(stance);
        }

        AgentPosition {
            agent: response.agent,
            confidence: response.confidence,
            figures,
            salient,
            stance: profile.primary,
            mentioned: profile.mentioned,
            leading_priority: profile.leading_priority,
            topics: lexicon::topics(text),
            text: text.to_string(),
        }
    }

    /// An action verb within `action_window` bytes of the figure, inside its clause.
    fn in_action_context(&self, text: &str, figure: &ExtractedFigure) -> bool {
        let (clause_start, clause_end) = lexicon::enclosing_clause(text, figure.offset, figure.end());
        let lo = figure.offset.saturating_sub(self.config.action_window);
        let hi = figure.end().saturating_add(self.config.action_window);
        lexicon::words(&text[clause_start..clause_end])
            .iter()
            .filter(|w| {
                let at = clause_start + w.offset;
                at >= lo && at < hi
            })
            .any(|w| lexicon::is_action_verb(&w.text))
    }

    fn pair_conflicts(&self, a: &AgentPosition, b: &AgentPosition, totals: &[Decimal]) -> Vec<Conflict> {
        let mut out = Vec::new();
        let pair = [a.agent, b.agent];
        let symbol = self.config.display_symbol();

        let mut complementary = false;
        if let (Some(x), Some(y)) = (a.salient_amount(), b.salient_amount()) {
            complementary = is_complementary(x, y, totals, self.config.complementary_tolerance);
            let divergence = divergence(x, y);
            if complementary {
                debug!(
                    a = %a.agent,
                    b = %b.agent,
                    "Figures are parts of a shared total, not a divergence"
                );
            } else if divergence > self.config.conflict_threshold {
                let percent = (divergence * Decimal::ONE_HUNDRED).round();
                let description = format!(
                    "{} recommends {} while {} recommends {} ({}% apart)",
                    a.agent.label(),
                    lexicon::format_amount(symbol, x),
                    b.agent.label(),
                    lexicon::format_amount(symbol, y),
                    percent,
                );
                out.extend(conflict(
                    ConflictType::NumericDivergence,
                    pair,
                    divergence.min(Decimal::ONE),
                    description,
                ));
            }
        }

        if !same_context(a, b) {
            return out;
        }

        if let (Some(sa), Some(sb)) = (a.stance, b.stance) {
            if sa.excludes(sb) && !complementary {
                let mut magnitude = self.config.directional_magnitude;
                if !a.mentioned.contains(&sb) && !b.mentioned.contains(&sa) {
                    magnitude += Decimal::new(25, 2);
                }
                let description = format!(
                    "{} favours {} while {} favours {}",
                    a.agent.label(),
                    sa,
                    b.agent.label(),
                    sb
                );
                out.extend(conflict(
                    ConflictType::DirectionalDisagreement,
                    pair,
                    magnitude,
                    description,
                ));
            }
        }

        let exclusive = matches!((a.stance, b.stance), (Some(sa), Some(sb)) if sa.excludes(sb));
        if let (Some(pa), Some(pb)) = (a.leading_priority, b.leading_priority) {
            if pa != pb && !exclusive {
                let description = format!(
                    "{} puts {} first while {} puts {} first",
                    a.agent.label(),
                    pa,
                    b.agent.label(),
                    pb
                );
                out.extend(conflict(
                    ConflictType::PriorityConflict,
                    pair,
                    self.config.priority_magnitude,
                    description,
                ));
            }
        }

        out
    }

    fn consensus(&self, positions: &[AgentPosition], conflicts: &[Conflict]) -> ConsensusLevel {
        if positions.len() < 2 {
            return ConsensusLevel::Insufficient;
        }
        if conflicts.is_empty() {
            return ConsensusLevel::Unanimous;
        }
        if positions.len() < 3 {
            return ConsensusLevel::Split;
        }

        let in_every: Vec<&AgentPosition> = positions
            .iter()
            .filter(|p| conflicts.iter().all(|c| c.involves(p.agent)))
            .collect();

        match in_every.as_slice() {
            [dissenter] => ConsensusLevel::Majority {
                dissenter: dissenter.agent,
            },
            [x, y] => {
                // One disputed pair: the dissenter is whoever the third agent does not side with.
                let Some(third) = positions.iter().find(|p| p.agent != x.agent && p.agent != y.agent)
                else {
                    return ConsensusLevel::Split;
                };
                let kind = conflicts[0].conflict_type;
                let threshold = self.config.conflict_threshold;
                let with_x = resolver::aligned(third, x, [*y], kind, threshold);
                let with_y = resolver::aligned(third, y, [*x], kind, threshold);
                match (with_x, with_y) {
                    (true, false) => ConsensusLevel::Majority { dissenter: y.agent },
                    (false, true) => ConsensusLevel::Majority { dissenter: x.agent },
                    _ => ConsensusLevel::Split,
                }
            }
            _ => ConsensusLevel::Split,
        }
    }
}

/// Relative divergence `|a - b| / max(a, b)`, guarded against zero.
pub(crate) fn divergence(a: Decimal, b: Decimal) -> Decimal {
    let denominator = a.max(b).max(Decimal::ONE);
    (a - b).abs() / denominator
}

/// Two figures are complementary when they add up to a larger stated total,
/// e.g. ₹75,000 and ₹25,000 out of a ₹1,00,000 bonus.
fn is_complementary(a: Decimal, b: Decimal, totals: &[Decimal], tolerance: Decimal) -> bool {
    let Some(sum) = a.checked_add(b) else {
        return false;
    };
    let largest = a.max(b);
    totals
        .iter()
        .any(|&total| total > largest && (sum - total).abs() <= tolerance * total)
}

fn same_context(a: &AgentPosition, b: &AgentPosition) -> bool {
    a.topics.is_empty() || b.topics.is_empty() || !a.topics.is_disjoint(&b.topics)
}

fn conflict(
    kind: ConflictType,
    pair: [AgentId; 2],
    magnitude: Decimal,
    description: String,
) -> Option<Conflict> {
    Conflict::new(kind, pair, magnitude, description).ok()
}

fn sort_conflicts(conflicts: &mut [Conflict]) {
    conflicts.sort_by(|x, y| {
        y.magnitude
            .cmp(&x.magnitude)
            .then_with(|| x.participants.cmp(&y.participants))
            .then(x.conflict_type.cmp(&y.conflict_type))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn detector() -> ConflictDetector {
        ConflictDetector::new(&CollaborationConfig::default()).unwrap()
    }

    fn response(agent: AgentId, text: &str) -> AgentResponse {
        AgentResponse::new(agent, text, dec!(0.8)).unwrap()
    }

    #[test]
    fn complementary_split_is_not_a_divergence() {
        let responses = vec![
            response(AgentId::Analyst, "Of your ₹1,00,000 bonus, use ₹75,000 for debt."),
            response(AgentId::Research, "Invest ₹25,000 in funds."),
        ];
        let conflicts = detector().detect(&responses);
        assert!(conflicts
            .iter()
            .all(|c| c.conflict_type != ConflictType::NumericDivergence));
    }

    #[test]
    fn complementary_split_against_a_reference_total() {
        let responses = vec![
            response(AgentId::Analyst, "Use ₹75,000 for debt."),
            response(AgentId::Research, "Invest ₹25,000 in funds."),
        ];
        let d = detector();
        let without = d.analyze(&responses, &[]);
        assert!(without
            .conflicts
            .iter()
            .chain(&without.notes)
            .any(|c| c.conflict_type == ConflictType::NumericDivergence));

        let with = d.analyze(&responses, &[dec!(100000)]);
        assert!(with.conflicts.is_empty());
        assert_eq!(with.consensus, ConsensusLevel::Unanimous);
    }

    #[test]
    fn complementary_tolerance_is_tunable() {
        let responses = vec![
            response(AgentId::Analyst, "Use ₹70,000 for debt."),
            response(AgentId::Research, "Use ₹20,000 for debt."),
        ];
        let strict = detector().analyze(&responses, &[dec!(100000)]);
        assert_eq!(strict.conflicts.len(), 1);

        let config = CollaborationConfig {
            complementary_tolerance: dec!(0.15),
            ..CollaborationConfig::default()
        };
        let lenient = ConflictDetector::new(&config)
            .unwrap()
            .analyze(&responses, &[dec!(100000)]);
        assert!(lenient.conflicts.is_empty());
    }

    #[test]
    fn divergent_figures_for_the_same_purpose() {
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car."),
            response(AgentId::RiskManagement, "Budget ₹5,00,000 for the car."),
        ];
        let conflicts = detector().detect(&responses);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::NumericDivergence);
        assert_eq!(conflicts[0].magnitude, dec!(0.6));
        assert_eq!(
            conflicts[0].pair(),
            Some((AgentId::Analyst, AgentId::RiskManagement))
        );
        assert!(conflicts[0].description.contains("₹2,00,000"));
    }

    #[test]
    fn salient_figure_prefers_action_context() {
        let d = detector();
        let positions = d.positions(&[response(
            AgentId::Analyst,
            "Your income is ₹12,00,000 a year. Put ₹3,00,000 into an index fund.",
        )]);
        assert_eq!(positions[0].salient_amount(), Some(dec!(300000)));
        assert_eq!(positions[0].headline(), "Put ₹3,00,000 into an index fund");

        let positions = d.positions(&[response(
            AgentId::Analyst,
            "Rent is ₹20,000 and the loan outstanding is ₹4,00,000.",
        )]);
        assert_eq!(positions[0].salient_amount(), Some(dec!(400000)));
    }

    #[test]
    fn structured_fields_override_text() {
        let d = detector();
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car.")
                .with_recommended_amount(dec!(480000))
                .with_stance(Stance::Spend),
            response(AgentId::Research, "Budget ₹5,00,000 for the car.").with_stance(Stance::Spend),
        ];
        let positions = d.positions(&responses);
        assert_eq!(positions[0].salient_amount(), Some(dec!(480000)));
        assert_eq!(positions[0].stance, Some(Stance::Spend));
        assert!(d.detect(&responses).is_empty());
    }

    #[test]
    fn opposite_directions_on_the_same_topic() {
        let responses = vec![
            response(
                AgentId::Analyst,
                "Use the ₹1,00,000 bonus to pay off your personal loan.",
            ),
            response(AgentId::Research, "Invest the ₹1,00,000 bonus in an index fund."),
        ];
        let conflicts = detector().detect(&responses);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].conflict_type,
            ConflictType::DirectionalDisagreement
        );
        assert_eq!(conflicts[0].magnitude, dec!(0.75));
    }

    #[test]
    fn unrelated_topics_do_not_conflict_directionally() {
        let responses = vec![
            response(AgentId::Analyst, "Pay off the car loan."),
            response(AgentId::Research, "Invest for your retirement through a pension plan."),
        ];
        assert!(detector().detect(&responses).is_empty());
    }

    #[test]
    fn priority_order_disagreement() {
        let responses = vec![
            response(
                AgentId::Analyst,
                "Build an emergency fund first, then pay off the personal loan.",
            ),
            response(
                AgentId::RiskManagement,
                "Pay off the personal loan first, then build an emergency fund.",
            ),
        ];
        let conflicts = detector().detect(&responses);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::PriorityConflict);
        assert_eq!(conflicts[0].magnitude, dec!(0.3));
    }

    #[test]
    fn exclusive_stances_do_not_also_raise_a_priority_conflict() {
        let responses = vec![
            response(
                AgentId::Analyst,
                "Use the ₹1,00,000 bonus to pay off your personal loan first.",
            ),
            response(AgentId::Research, "Invest the ₹1,00,000 bonus in an index fund first."),
        ];
        let report = detector().analyze(&responses, &[]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(
            report.conflicts[0].conflict_type,
            ConflictType::DirectionalDisagreement
        );
        assert!(report.notes.is_empty());
    }

    #[test]
    fn em_dash_before_a_full_stop_does_not_break_detection() {
        let responses = vec![
            response(AgentId::Analyst, "Pay off the ₹75,000 loan—quickly. Then invest."),
            response(AgentId::Research, "Clear the ₹75,000 loan—today. Then save “the rest”."),
        ];
        let d = detector();
        let positions = d.positions(&responses);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].salient_amount(), Some(dec!(75000)));
        assert!(d
            .detect(&responses)
            .iter()
            .all(|c| c.conflict_type != ConflictType::NumericDivergence));
    }

    #[test]
    fn one_conflict_per_pair_with_the_rest_demoted() {
        let responses = vec![
            response(AgentId::Analyst, "Invest ₹2,00,000 in equity funds."),
            response(AgentId::Research, "Keep ₹50,000 in a savings deposit."),
        ];
        let report = detector().analyze(&responses, &[]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(
            report.conflicts[0].conflict_type,
            ConflictType::NumericDivergence
        );
        assert_eq!(report.notes.len(), 1);
        assert_eq!(
            report.notes[0].conflict_type,
            ConflictType::DirectionalDisagreement
        );
    }

    #[test]
    fn lone_dissenter_is_a_majority() {
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car."),
            response(AgentId::Research, "Budget ₹2,10,000 for the car."),
            response(AgentId::RiskManagement, "Budget ₹5,00,000 for the car."),
        ];
        let report = detector().analyze(&responses, &[]);
        assert_eq!(report.conflicts.len(), 2);
        assert!(report.conflicts[0].magnitude >= report.conflicts[1].magnitude);
        assert_eq!(
            report.consensus,
            ConsensusLevel::Majority {
                dissenter: AgentId::RiskManagement
            }
        );
    }

    #[test]
    fn disputed_pair_without_a_tiebreaker_is_split() {
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car."),
            response(AgentId::Research, "Budget ₹5,00,000 for the car."),
            response(AgentId::RiskManagement, "Keep a cushion before any purchase."),
        ];
        let report = detector().analyze(&responses, &[]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.consensus, ConsensusLevel::Split);
    }

    #[test]
    fn missing_agents_are_skipped() {
        let responses = vec![
            response(AgentId::Analyst, "Budget ₹2,00,000 for the car."),
            AgentResponse::placeholder(AgentId::Research),
            AgentResponse::placeholder(AgentId::RiskManagement),
        ];
        let report = detector().analyze(&responses, &[]);
        assert!(report.conflicts.is_empty());
        assert_eq!(report.consensus, ConsensusLevel::Insufficient);
    }

    #[test]
    fn agents_without_figures_never_diverge_numerically() {
        let responses = vec![
            response(AgentId::Analyst, "Budget carefully for the car."),
            response(AgentId::Research, "Budget ₹5,00,000 for the car."),
        ];
        assert!(detector().detect(&responses).is_empty());
    }

    #[test]
    fn participants_always_responded() {
        let responses = vec![
            response(AgentId::Analyst, "Invest ₹2,00,000 in equity funds."),
            AgentResponse::placeholder(AgentId::Research),
            response(AgentId::RiskManagement, "Keep ₹50,000 in a savings deposit."),
        ];
        for conflict in detector().detect(&responses) {
            assert!(!conflict.involves(AgentId::Research));
            assert_eq!(conflict.participants.len(), 2);
        }
    }
}
