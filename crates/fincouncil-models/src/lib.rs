pub mod agent_message;
pub mod config;
pub mod conflict;
pub mod error;
pub mod session;
pub mod store_schema;

pub use agent_message::{AgentId, AgentRequest, AgentResponse, Stance};
pub use config::{
    AdvisorConfig, AgentsConfig, CollaborationConfig, CouncilConfig, CurrencyMarkers, StoreConfig,
};
pub use conflict::{ConflictType, Conflict, ConsensusLevel, ExtractedFigure};
pub use error::ModelError;
pub use session::{
    AgentOutcome, AgentReport, CollaborationSession, DiscussionTurn, SessionStage,
};
