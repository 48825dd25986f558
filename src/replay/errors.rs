use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("replay capacity must be positive")]
    ZeroCapacity,

    #[error("replay not filled yet: {written} of {capacity} slots written")]
    NotFilled { written: u64, capacity: usize },
}
