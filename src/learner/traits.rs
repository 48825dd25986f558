use super::errors::LearnerError;
use crate::replay::Transition;

/// Trainable action-value function.
pub trait QFunction: Clone {
    fn input_dim(&self) -> usize;
    fn num_actions(&self) -> usize;

    /// One value per action.
    fn q_values(&self, input: &[f32]) -> Vec<f32>;

    /// One optimiser step pulling `Q(input_i, actions_i)` toward
    /// `targets_i` under mean squared error. Returns the pre-step loss.
    fn fit(&mut self, inputs: &[Vec<f32>], actions: &[usize], targets: &[f32]) -> f32;

    /// Overwrite this function's parameters with `other`'s.
    fn copy_weights_from(&mut self, other: &Self);
}

/// Value-based learner driven by the trainer.
pub trait Learner {
    fn select_action(&mut self, input: &[f32], greedy: bool) -> Result<usize, LearnerError>;
    fn observe(&mut self, transition: Transition);
    /// Returns the batch loss.
    fn learn(&mut self) -> Result<f32, LearnerError>;
}

/// Index of the largest value; first one wins ties.
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv { (i, v) } else { (bi, bv) }
        })
        .0
}
