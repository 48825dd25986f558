mod counterfactual;
mod errors;
mod store;

pub use counterfactual::{CartesianProduct, CounterfactualAugmenter, DEFAULT_NUM_UPDATES};
pub use errors::ReplayError;
pub use store::{ReplayStore, Transition};
