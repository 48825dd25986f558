use serde::{Deserialize, Serialize};

/// Encoded observation: availability half and memory half.
///
/// Both halves are owned copies; nothing here aliases environment state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub state: Vec<u64>,
    pub memory: Vec<u64>, // empty in rnn mode
}

impl Observation {
    pub fn len(&self) -> usize {
        self.state.len() + self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `state ++ memory` as learner input.
    pub fn to_input(&self) -> Vec<f32> {
        self.state
            .iter()
            .chain(self.memory.iter())
            .map(|&v| v as f32)
            .collect()
    }
}

/// Open extension point attached to every step.
pub type StepInfo = serde_json::Value;
