mod availability;
mod donut;
mod encoding;
mod errors;
mod traits;
mod types;

pub use availability::AvailabilitySchedule;
pub use donut::{DEFAULT_AVAILABILITY, DonutConfig, DonutEnv, NSW_EPSILON, nsw_reward};
pub use encoding::{StateEncoder, StateMode, bit_width};
pub use errors::EnvError;
pub use traits::Env;
pub use types::{Observation, StepInfo};
