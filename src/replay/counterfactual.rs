//! Counterfactual experience augmentation.
//!
//! One real transition is expanded into every memory state in which each
//! recipient had already advanced by `1..=num_updates` claims (capped at the
//! episode length). Each expanded state becomes a synthetic transition with
//! the same action and availability halves.
//!
//! # Cost
//!
//! The expansion is a Cartesian product over recipients, so one call inserts
//! up to `num_updates^P` transitions. Keep `num_updates` small (2 by
//! default). With augmentation on, the trainer scales batch size by `2^P` and
//! replay capacity by `2^(P-1)` to absorb the volume.

use tracing::trace;

use super::store::{ReplayStore, Transition};
use crate::env::{DonutEnv, StateEncoder, nsw_reward};

pub const DEFAULT_NUM_UPDATES: u64 = 2;

#[derive(Debug, Clone)]
pub struct CounterfactualAugmenter {
    encoder: StateEncoder,
    episode_length: u64,
    num_updates: u64,
}

impl CounterfactualAugmenter {
    pub fn new(encoder: StateEncoder, episode_length: usize, num_updates: u64) -> Self {
        Self {
            encoder,
            episode_length: episode_length as u64,
            num_updates,
        }
    }

    /// Augmenter sharing the environment's encoder and episode length.
    pub fn for_env(env: &DonutEnv, num_updates: u64) -> Self {
        Self::new(env.encoder().clone(), env.episode_length(), num_updates)
    }

    pub fn num_updates(&self) -> u64 {
        self.num_updates
    }

    /// Per-recipient candidate values `(actual, min(L, actual + n)]`.
    pub fn candidates(&self, actual_memory: &[u64]) -> Vec<Vec<u64>> {
        actual_memory
            .iter()
            .map(|&m| {
                let hi = self.episode_length.min(m + self.num_updates);
                (m + 1..=hi).collect()
            })
            .collect()
    }

    /// Every counterfactual current-memory state, before filtering.
    pub fn states(&self, actual_memory: &[u64]) -> CartesianProduct {
        CartesianProduct::new(self.candidates(actual_memory))
    }

    /// Push one synthetic transition per valid counterfactual state derived
    /// from `real`, where `actual_memory` is the raw pre-step memory. Returns
    /// the number inserted.
    pub fn augment(
        &self,
        real: &Transition,
        actual_memory: &[u64],
        replay: &mut ReplayStore,
    ) -> usize {
        let action = real.action;
        let mut inserted = 0;
        for curr in self.states(actual_memory) {
            if curr[action] == self.episode_length {
                continue;
            }
            let mut next = curr.clone();
            next[action] += 1;

            let reward = if real.reward == 0.0 {
                0.0
            } else {
                nsw_reward(&next, 0.0) as f32
            };

            replay.store(Transition {
                state: real.state.clone(),
                memory: self.encode(curr),
                action,
                reward,
                next_state: real.next_state.clone(),
                next_memory: self.encode(next),
            });
            inserted += 1;
        }
        trace!(action, inserted, "counterfactual transitions stored");
        inserted
    }

    fn encode(&self, mut memory: Vec<u64>) -> Vec<u64> {
        self.encoder.normalise_and_encode(&mut memory)
    }
}

/// Odometer over one value per pool, last pool varying fastest.
#[derive(Debug, Clone)]
pub struct CartesianProduct {
    pools: Vec<Vec<u64>>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl CartesianProduct {
    pub fn new(pools: Vec<Vec<u64>>) -> Self {
        let exhausted = pools.is_empty() || pools.iter().any(Vec::is_empty);
        Self {
            cursor: vec![0; pools.len()],
            pools,
            exhausted,
        }
    }
}

impl Iterator for CartesianProduct {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Vec<u64>> {
        if self.exhausted {
            return None;
        }
        let item = self
            .cursor
            .iter()
            .zip(&self.pools)
            .map(|(&i, pool)| pool[i])
            .collect();

        self.exhausted = true;
        for pos in (0..self.pools.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.pools[pos].len() {
                self.exhausted = false;
                break;
            }
            self.cursor[pos] = 0;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StateMode;

    fn augmenter(mode: StateMode, people: usize, len: usize) -> CounterfactualAugmenter {
        CounterfactualAugmenter::new(
            StateEncoder::new(mode, people, len).unwrap(),
            len,
            DEFAULT_NUM_UPDATES,
        )
    }

    #[test]
    fn product_enumerates_in_odometer_order() {
        let states: Vec<_> = CartesianProduct::new(vec![vec![1, 2], vec![5, 6]]).collect();
        assert_eq!(states, vec![vec![1, 5], vec![1, 6], vec![2, 5], vec![2, 6]]);
    }

    #[test]
    fn empty_pool_yields_nothing() {
        assert_eq!(CartesianProduct::new(vec![vec![1], vec![]]).count(), 0);
    }

    #[test]
    fn candidates_are_capped_at_episode_length() {
        let aug = augmenter(StateMode::Deep, 3, 5);
        assert_eq!(
            aug.candidates(&[0, 4, 5]),
            vec![vec![1, 2], vec![5], Vec::<u64>::new()]
        );
    }

    #[test]
    fn saturated_action_is_skipped() {
        let aug = augmenter(StateMode::Deep, 2, 5);
        let real = Transition {
            state: vec![1, 1],
            memory: vec![4, 0],
            action: 0,
            reward: 1.0,
            next_state: vec![1, 1],
            next_memory: vec![5, 0],
        };
        let mut replay = ReplayStore::new(16).unwrap();
        // recipient 0 can only move to 5 == L, so every state is filtered
        assert_eq!(aug.augment(&real, &[4, 0], &mut replay), 0);
        assert!(replay.is_empty());
    }

    #[test]
    fn binary_mode_encodes_synthetic_memory() {
        let aug = augmenter(StateMode::Binary, 2, 3);
        let real = Transition {
            state: vec![1, 0],
            memory: vec![0, 0, 0, 0],
            action: 1,
            reward: 0.7,
            next_state: vec![0, 1],
            next_memory: vec![0, 0, 0, 1],
        };
        let mut replay = ReplayStore::new(8).unwrap();
        let n = aug.augment(&real, &[0, 0], &mut replay);
        assert_eq!(n, 4);
        let first = replay.get(0).unwrap();
        // curr [1, 1] -> next [1, 2]
        assert_eq!(first.memory, vec![0, 1, 0, 1]);
        assert_eq!(first.next_memory, vec![0, 1, 1, 0]);
        assert_eq!(first.state, real.state);
        assert_eq!(first.next_state, real.next_state);
        let want = (2.0f64.ln() + 3.0f64.ln()) as f32;
        assert!((first.reward - want).abs() < 1e-6);
    }
}
