use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::ReplayError;
use crate::env::Observation;

/// One replay entry. `state`/`next_state` are availability encodings,
/// `memory`/`next_memory` the memory encodings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Vec<u64>,
    pub memory: Vec<u64>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Vec<u64>,
    pub next_memory: Vec<u64>,
}

impl Transition {
    pub fn new(obs: &Observation, action: usize, reward: f32, next_obs: &Observation) -> Self {
        Self {
            state: obs.state.clone(),
            memory: obs.memory.clone(),
            action,
            reward,
            next_state: next_obs.state.clone(),
            next_memory: next_obs.memory.clone(),
        }
    }

    pub fn input(&self) -> Vec<f32> {
        concat(&self.state, &self.memory)
    }

    pub fn next_input(&self) -> Vec<f32> {
        concat(&self.next_state, &self.next_memory)
    }
}

fn concat(a: &[u64], b: &[u64]) -> Vec<f32> {
    a.iter().chain(b).map(|&v| v as f32).collect()
}

/// Fixed-capacity ring of transitions, overwritten oldest first.
#[derive(Debug, Clone)]
pub struct ReplayStore {
    slots: Vec<Transition>,
    capacity: usize,
    written: u64,
}

impl ReplayStore {
    pub fn new(capacity: usize) -> Result<Self, ReplayError> {
        if capacity == 0 {
            return Err(ReplayError::ZeroCapacity);
        }
        Ok(Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            written: 0,
        })
    }

    /// Write at `written mod capacity`. Never fails.
    pub fn store(&mut self, transition: Transition) {
        let index = (self.written % self.capacity as u64) as usize;
        if index < self.slots.len() {
            self.slots[index] = transition;
        } else {
            self.slots.push(transition);
        }
        self.written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total number of `store` calls, including overwritten ones.
    pub fn write_count(&self) -> u64 {
        self.written
    }

    pub fn is_filled(&self) -> bool {
        self.written >= self.capacity as u64
    }

    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.slots.get(index)
    }

    /// `batch_size` slots drawn uniformly with replacement.
    pub fn sample<R: Rng>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<&Transition>, ReplayError> {
        if !self.is_filled() {
            return Err(ReplayError::NotFilled {
                written: self.written,
                capacity: self.capacity,
            });
        }
        Ok((0..batch_size)
            .map(|_| &self.slots[rng.random_range(0..self.capacity)])
            .collect())
    }
}
