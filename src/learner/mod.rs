mod dqn;
mod errors;
mod mlp;
mod traits;

pub use dqn::{DqnAgent, DqnConfig};
pub use errors::LearnerError;
pub use mlp::Mlp;
pub use traits::{Learner, QFunction, argmax};
