use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(String),

    #[error("A conflict needs at least two distinct participants, got {0}")]
    TooFewParticipants(usize),

    #[error("Discussion rounds start at 1, got {0}")]
    InvalidRound(u32),
}
