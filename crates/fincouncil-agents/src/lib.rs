pub mod advisor;
pub mod claude_cli;
pub mod coordinator;
pub mod detector;
pub mod discussion;
pub mod error;
pub mod extractor;
mod lexicon;
pub mod parser;
pub mod prompts;
pub mod resolver;
pub mod synthesizer;

pub mod test_support;

pub use advisor::{AdvisorAgent, ClaudeAdvisor};
pub use coordinator::CollaborationCoordinator;
pub use detector::{AgentPosition, ConflictDetector, ConflictReport};
pub use discussion::DiscussionSimulator;
pub use error::{AgentError, CoordinatorError};
pub use extractor::AmountExtractor;
pub use synthesizer::{ConsensusSynthesizer, Synthesis};
