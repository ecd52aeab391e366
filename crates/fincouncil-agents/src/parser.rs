use fincouncil_models::agent_message::{default_confidence, AgentId, AgentResponse, Stance};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AgentError;

/// The first JSON object embedded in an advisor reply.
///
/// Candidates are tried in order: the whole reply, each fenced code block
/// (any language tag), then each balanced `{ ... }` span. A candidate that
/// does not parse is skipped rather than ending the search.
pub fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    std::iter::once(trimmed.to_string())
        .chain(fenced_blocks(trimmed))
        .chain(balanced_objects(trimmed))
        .find_map(|candidate| match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

/// Bodies of ``` fenced blocks. The info string after the opening fence is dropped.
fn fenced_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let Some(line_end) = after_fence.find('\n') else {
            break;
        };
        let body = &after_fence[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(body[..close].trim().to_string());
        rest = &body[close + 3..];
    }
    blocks
}

/// Every top-level balanced `{ ... }` span, skipping braces inside strings.
fn balanced_objects(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    spans
}

/// Fields an advisor is asked to return. Everything but the text is optional.
#[derive(Debug, Deserialize)]
struct RawAdvice {
    #[serde(alias = "analysis", alias = "recommendation")]
    analysis_text: String,
    #[serde(default = "default_confidence")]
    confidence: Decimal,
    #[serde(default)]
    stance: Option<Stance>,
    #[serde(default)]
    recommended_amount: Option<Decimal>,
}

impl RawAdvice {
    fn prose(text: &str) -> Self {
        Self {
            analysis_text: text.trim().to_string(),
            confidence: default_confidence(),
            stance: None,
            recommended_amount: None,
        }
    }
}

/// Parse an advisor's raw output. Structured JSON is preferred; plain prose is
/// accepted as the analysis text with the default confidence, as is prose that
/// merely quotes a JSON object without an analysis field. Confidence is clamped
/// into [0, 1].
pub fn parse_agent_response(agent: AgentId, raw: &str) -> Result<AgentResponse, AgentError> {
    if raw.trim().is_empty() {
        return Err(AgentError::Parse("Empty advisor output".to_string()));
    }

    let advice = find_json_object(raw)
        .and_then(|object| match serde_json::from_value::<RawAdvice>(Value::Object(object)) {
            Ok(advice) => Some(advice),
            Err(e) => {
                debug!(%agent, error = %e, "Embedded JSON is not advice, reading reply as prose");
                None
            }
        })
        .unwrap_or_else(|| RawAdvice::prose(raw));

    Ok(AgentResponse {
        agent,
        analysis_text: advice.analysis_text,
        confidence: advice.confidence,
        stance: advice.stance,
        recommended_amount: advice.recommended_amount.filter(|a| *a >= Decimal::ZERO),
    }
    .clamp_confidence())
}
