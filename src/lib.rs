//! Fair donut allocation with deep Q-learning.
//!
//! [`env::DonutEnv`] hands one donut per step to one of `P` recipients and
//! rewards Nash social welfare. [`replay::CounterfactualAugmenter`] turns each
//! real transition into many plausible alternatives before they reach the
//! [`learner::DqnAgent`]'s replay buffer.

pub mod env;
pub mod learner;
pub mod logging;
pub mod replay;
pub mod report;
pub mod train;

pub use env::{AvailabilitySchedule, DonutConfig, DonutEnv, Env, EnvError, Observation, StateMode};
pub use learner::{DqnAgent, DqnConfig, Learner, LearnerError, Mlp, QFunction};
pub use replay::{CounterfactualAugmenter, ReplayError, ReplayStore, Transition};
pub use train::{ExperimentConfig, TrainConfig, TrainError, TrainingStats};
