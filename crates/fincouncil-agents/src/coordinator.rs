use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fincouncil_cache::{ResponseCache, SessionStore};
use fincouncil_models::agent_message::{AgentId, AgentRequest, AgentResponse};
use fincouncil_models::config::CollaborationConfig;
use fincouncil_models::session::{
    AgentOutcome, AgentReport, CollaborationSession, SessionStage, SESSION_SCHEMA_VERSION,
};
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::advisor::AdvisorAgent;
use crate::detector::ConflictDetector;
use crate::discussion::DiscussionSimulator;
use crate::error::{AgentError, CoordinatorError};
use crate::extractor::AmountExtractor;
use crate::synthesizer::ConsensusSynthesizer;

type Slot = Option<(AgentResponse, AgentReport)>;

/// Runs one collaboration end to end: fan out to the advisors, detect
/// conflicts, narrate the discussion, synthesize, persist.
pub struct CollaborationCoordinator {
    advisors: Vec<Arc<dyn AdvisorAgent>>,
    store: Arc<dyn SessionStore>,
    response_cache: Option<Arc<ResponseCache>>,
    agent_timeout: Duration,
    detector: ConflictDetector,
    simulator: DiscussionSimulator,
    synthesizer: ConsensusSynthesizer,
}

impl CollaborationCoordinator {
    pub fn new(
        advisors: Vec<Arc<dyn AdvisorAgent>>,
        store: Arc<dyn SessionStore>,
        agent_timeout: Duration,
        config: &CollaborationConfig,
    ) -> Result<Self, CoordinatorError> {
        Ok(Self {
            advisors,
            store,
            response_cache: None,
            agent_timeout,
            detector: ConflictDetector::new(config)?,
            simulator: DiscussionSimulator::new(config)?,
            synthesizer: ConsensusSynthesizer::new(config)?,
        })
    }

    /// Reuse advisor responses for identical query and context.
    pub fn with_response_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.response_cache = Some(cache);
        self
    }

    pub async fn run_collaboration(
        &self,
        query: &str,
        financial_context: serde_json::Value,
        session_id: Option<String>,
    ) -> Result<CollaborationSession, CoordinatorError> {
        self.run_collaboration_with_cancel(query, financial_context, session_id, CancellationToken::new())
            .await
    }

    /// Run a collaboration that the caller may cancel. A cancelled run aborts
    /// in-flight advisor calls and is never stored.
    pub async fn run_collaboration_with_cancel(
        &self,
        query: &str,
        financial_context: serde_json::Value,
        session_id: Option<String>,
        cancel: CancellationToken,
    ) -> Result<CollaborationSession, CoordinatorError> {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = Utc::now();
        let start = Instant::now();
        info!(session_id = %session_id, "Starting collaboration");

        if cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled(session_id));
        }

        let mut stages = StageTracker::new();
        let (responses, agent_reports) = self
            .collect(&session_id, query, &financial_context, &cancel)
            .await?;

        stages.advance(SessionStage::DetectingConflicts)?;
        let totals = reference_totals(self.detector.extractor(), query, &financial_context);
        let positions = self.detector.positions(&responses);
        let report = self.detector.analyze_positions(&positions, &totals);

        let discussion = if report.conflicts.is_empty() {
            Vec::new()
        } else {
            stages.advance(SessionStage::Discussing)?;
            self.simulator.simulate_positions(&report.conflicts, &positions)
        };

        stages.advance(SessionStage::Synthesizing)?;
        let synthesis = self.synthesizer.compose(
            query,
            &responses,
            &positions,
            &report.conflicts,
            &report.notes,
        );

        if cancel.is_cancelled() {
            warn!(session_id = %session_id, "Collaboration cancelled before completion");
            return Err(CoordinatorError::Cancelled(session_id));
        }
        stages.advance(SessionStage::Done)?;

        let session = CollaborationSession {
            session_id,
            schema_version: SESSION_SCHEMA_VERSION,
            user_query: query.to_string(),
            responses,
            conflicts: report.conflicts,
            conflict_notes: report.notes,
            consensus: report.consensus,
            discussion,
            final_answer: synthesis.final_answer,
            overall_confidence: synthesis.overall_confidence,
            low_relevance: synthesis.low_relevance,
            stages: stages.into_stages(),
            agent_reports,
            created_at,
            completed_at: Utc::now(),
        };

        self.store.save(&session).await?;

        info!(
            session_id = %session.session_id,
            conflicts = session.conflicts.len(),
            confidence = %session.overall_confidence,
            elapsed_ms = start.elapsed().as_millis(),
            "Collaboration complete"
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<CollaborationSession, CoordinatorError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| CoordinatorError::NotFound(session_id.to_string()))
    }

    /// Fan out to every role concurrently and wait for all of them (or their
    /// timeouts). Each role writes only its own slot.
    async fn collect(
        &self,
        session_id: &str,
        query: &str,
        financial_context: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<(Vec<AgentResponse>, Vec<AgentReport>), CoordinatorError> {
        let mut slots: [Slot; 3] = std::array::from_fn(|_| None);
        let mut join_set = JoinSet::new();

        for agent in AgentId::ALL {
            let Some(advisor) = self.advisors.iter().find(|a| a.id() == agent).cloned() else {
                warn!(agent = %agent, "No advisor configured");
                slots[agent.index()] = Some(failed(agent, "no advisor configured".to_string(), 0));
                continue;
            };

            if let Some(cache) = &self.response_cache {
                if let Some(hit) = cache.get(agent, query, financial_context).await {
                    slots[agent.index()] = Some((
                        hit,
                        AgentReport {
                            agent,
                            outcome: AgentOutcome::Cached,
                            elapsed_ms: 0,
                        },
                    ));
                    continue;
                }
            }

            let request = AgentRequest {
                request_id: Uuid::new_v4(),
                session_id: session_id.to_string(),
                agent,
                query: query.to_string(),
                financial_context: financial_context.clone(),
            };
            let timeout = self.agent_timeout;
            join_set.spawn(async move {
                let started = Instant::now();
                let result = match tokio::time::timeout(timeout, advisor.analyze(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Timeout(timeout)),
                };
                (agent, result, started.elapsed())
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    warn!(session_id, "Collaboration cancelled while collecting");
                    return Err(CoordinatorError::Cancelled(session_id.to_string()));
                }
                joined = join_set.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    match joined {
                        Ok((agent, result, elapsed)) => {
                            let slot = self.record(agent, result, elapsed, query, financial_context).await;
                            slots[agent.index()] = Some(slot);
                        }
                        Err(e) => error!(error = %e, "Advisor task panicked"),
                    }
                }
            }
        }

        let mut responses = Vec::with_capacity(slots.len());
        let mut reports = Vec::with_capacity(slots.len());
        for (agent, slot) in AgentId::ALL.into_iter().zip(slots) {
            let (response, report) =
                slot.unwrap_or_else(|| failed(agent, "advisor task aborted".to_string(), 0));
            responses.push(response);
            reports.push(report);
        }
        Ok((responses, reports))
    }

    async fn record(
        &self,
        agent: AgentId,
        result: Result<AgentResponse, AgentError>,
        elapsed: Duration,
        query: &str,
        financial_context: &serde_json::Value,
    ) -> (AgentResponse, AgentReport) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(mut response) => {
                if response.agent != agent {
                    warn!(expected = %agent, got = %response.agent, "Advisor answered under the wrong role");
                    response.agent = agent;
                }
                let response = response.clamp_confidence();
                info!(agent = %agent, confidence = %response.confidence, elapsed_ms, "Advisor succeeded");
                if let Some(cache) = &self.response_cache {
                    cache.insert(&response, query, financial_context).await;
                }
                (
                    response,
                    AgentReport {
                        agent,
                        outcome: AgentOutcome::Succeeded,
                        elapsed_ms,
                    },
                )
            }
            Err(AgentError::Timeout(limit)) => {
                warn!(agent = %agent, timeout_ms = limit.as_millis(), "Advisor timed out");
                (
                    AgentResponse::placeholder(agent),
                    AgentReport {
                        agent,
                        outcome: AgentOutcome::TimedOut,
                        elapsed_ms,
                    },
                )
            }
            Err(e) => {
                warn!(agent = %agent, error = %e, elapsed_ms, "Advisor failed");
                failed(agent, e.to_string(), elapsed_ms)
            }
        }
    }
}

fn failed(agent: AgentId, reason: String, elapsed_ms: u64) -> (AgentResponse, AgentReport) {
    (
        AgentResponse::placeholder(agent),
        AgentReport {
            agent,
            outcome: AgentOutcome::Failed { reason },
            elapsed_ms,
        },
    )
}

/// Forward-only walk through the session stages.
struct StageTracker {
    stages: Vec<SessionStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stages: vec![SessionStage::Collecting],
        }
    }

    fn current(&self) -> SessionStage {
        self.stages.last().copied().unwrap_or(SessionStage::Collecting)
    }

    fn advance(&mut self, next: SessionStage) -> Result<(), CoordinatorError> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(CoordinatorError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        debug!(from = ?current, to = ?next, "Stage advanced");
        self.stages.push(next);
        Ok(())
    }

    fn into_stages(self) -> Vec<SessionStage> {
        self.stages
    }
}

/// Amounts stated by the user, in the query text or anywhere in the context.
fn reference_totals(
    extractor: &AmountExtractor,
    query: &str,
    financial_context: &serde_json::Value,
) -> Vec<Decimal> {
    let mut totals = extractor.amounts(query);
    collect_context_amounts(extractor, financial_context, &mut totals);
    totals
}

fn collect_context_amounts(extractor: &AmountExtractor, value: &serde_json::Value, out: &mut Vec<Decimal>) {
    match value {
        serde_json::Value::Number(n) => {
            if let Ok(amount) = n.to_string().parse::<Decimal>() {
                if amount >= extractor.noise_floor() {
                    out.push(amount);
                }
            }
        }
        serde_json::Value::String(s) => out.extend(extractor.amounts(s)),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_context_amounts(extractor, item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_context_amounts(extractor, item, out);
            }
        }
        _ => {}
    }
}
