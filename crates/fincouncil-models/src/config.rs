use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::agent_message::AgentId;

/// Top-level configuration for the advisory council.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CouncilConfig {
    pub store: StoreConfig,
    pub agents: AgentsConfig,
    pub collaboration: CollaborationConfig,
}

/// Configuration for session persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite session database.
    pub sqlite_path: String,
    /// Maximum number of sessions held in the in-memory hot cache.
    pub memory_max_capacity: u64,
    /// How long a session stays in the hot cache after it was last written or read.
    pub memory_ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/fincouncil_sessions.db".to_string(),
            memory_max_capacity: 1_000,
            memory_ttl_seconds: 900,
        }
    }
}

/// Configuration for the advisor agents and how they are called.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Per-agent call timeout in seconds.
    pub agent_timeout_seconds: f64,
    /// Default model for advisor agents.
    pub model: String,
    pub advisors: Vec<AdvisorConfig>,
    /// Capacity of the process-scoped response cache.
    pub response_cache_capacity: u64,
    /// TTL of cached agent responses. 0 disables the cache.
    pub response_cache_ttl_seconds: u64,
}

impl AgentsConfig {
    /// The per-agent timeout, falling back to the default for non-finite or negative values.
    pub fn agent_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.agent_timeout_seconds)
            .unwrap_or(Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECONDS as u64))
    }

    /// The advisor entry for a role, if configured.
    pub fn advisor(&self, agent: AgentId) -> Option<&AdvisorConfig> {
        self.advisors.iter().find(|a| a.agent == agent)
    }
}

const DEFAULT_AGENT_TIMEOUT_SECONDS: f64 = 8.0;

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            agent_timeout_seconds: DEFAULT_AGENT_TIMEOUT_SECONDS,
            model: "claude-3-5-haiku-latest".to_string(),
            advisors: AgentId::ALL
                .iter()
                .map(|&agent| AdvisorConfig {
                    agent,
                    model: None,
                    enabled: true,
                })
                .collect(),
            response_cache_capacity: 512,
            response_cache_ttl_seconds: 300,
        }
    }
}

/// Configuration for a single advisor role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvisorConfig {
    pub agent: AgentId,
    /// Override model for this advisor. Falls back to `AgentsConfig::model`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Currency tokens recognized around a numeric amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurrencyMarkers {
    /// Markers that precede the number (e.g. `₹5,000`, `Rs. 5000`).
    pub prefix: Vec<String>,
    /// Markers that follow the number (e.g. `5 lakh rupees`).
    pub suffix: Vec<String>,
}

impl Default for CurrencyMarkers {
    fn default() -> Self {
        Self {
            prefix: vec![
                "₹".to_string(),
                "Rs.".to_string(),
                "Rs".to_string(),
                "INR".to_string(),
            ],
            suffix: vec!["rupees".to_string(), "INR".to_string()],
        }
    }
}

/// Tuning for conflict detection, discussion and synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollaborationConfig {
    /// Relative divergence above which two figures conflict.
    pub conflict_threshold: Decimal,
    pub max_discussion_rounds: u32,
    /// How close (relative) two figures must sum to a stated total to count as complementary.
    pub complementary_tolerance: Decimal,
    /// Amounts below this are discarded as noise.
    pub noise_floor: Decimal,
    /// Bytes on either side of a figure searched for an action verb.
    pub action_window: usize,
    pub directional_magnitude: Decimal,
    pub priority_magnitude: Decimal,
    pub currency_markers: CurrencyMarkers,
    /// Scale suffix to multiplier, e.g. `lakh = 100000`.
    pub currency_scale_table: BTreeMap<String, u64>,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        let currency_scale_table = [
            ("thousand", 1_000),
            ("k", 1_000),
            ("lakh", 100_000),
            ("lakhs", 100_000),
            ("lac", 100_000),
            ("million", 1_000_000),
            ("crore", 10_000_000),
            ("crores", 10_000_000),
            ("cr", 10_000_000),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            conflict_threshold: Decimal::new(25, 2),
            max_discussion_rounds: 3,
            complementary_tolerance: Decimal::new(5, 2),
            noise_floor: Decimal::from(100),
            action_window: 60,
            directional_magnitude: Decimal::new(5, 1),
            priority_magnitude: Decimal::new(3, 1),
            currency_markers: CurrencyMarkers::default(),
            currency_scale_table,
        }
    }
}

impl CollaborationConfig {
    /// Symbol used when rendering amounts back into prose: the first prefix marker.
    pub fn display_symbol(&self) -> &str {
        self.currency_markers
            .prefix
            .first()
            .map_or("", String::as_str)
    }
}
