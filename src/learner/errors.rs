use thiserror::Error;

use crate::replay::ReplayError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LearnerError {
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("invalid learner config: {0}")]
    InvalidConfig(String),

    #[error("input has {got} features, network expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}
