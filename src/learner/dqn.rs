//! Deep Q-network agent with a periodically synchronised target network.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::errors::LearnerError;
use super::mlp::Mlp;
use super::traits::{Learner, QFunction, argmax};
use crate::replay::{DEFAULT_NUM_UPDATES, ReplayError, ReplayStore, Transition};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub learning_rate: f32,
    /// Initial exploration rate.
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_floor: f64,
    pub gamma: f32,
    pub batch_size: usize,
    /// Learn calls between target network refreshes.
    pub target_sync_interval: u64,
    pub memory_capacity: usize,
    pub counterfactual: bool,
    pub num_updates: u64,
    pub hidden: Vec<usize>,
    /// Agent RNG seed. `run_repetitions` offsets it by the repetition index.
    pub seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            epsilon: 1.0,
            epsilon_decay: 0.999,
            epsilon_floor: 0.2,
            gamma: 0.95,
            batch_size: 64,
            target_sync_interval: 1000,
            memory_capacity: 400,
            counterfactual: false,
            num_updates: DEFAULT_NUM_UPDATES,
            hidden: vec![32, 16, 8],
            seed: 2025,
        }
    }
}

impl DqnConfig {
    /// Batch and replay sizes rescaled for counterfactual volume:
    /// batch x `2^people`, capacity x `2^(people-1)`. Sizes that do not fit
    /// in `usize` are a config error.
    pub fn scaled_for_counterfactuals(mut self, people: usize) -> Result<Self, LearnerError> {
        if self.counterfactual && people > 0 {
            self.batch_size = scale_pow2(self.batch_size, people, "batch_size")?;
            self.memory_capacity = scale_pow2(self.memory_capacity, people - 1, "memory_capacity")?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), LearnerError> {
        if self.batch_size == 0 {
            return Err(LearnerError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.target_sync_interval == 0 {
            return Err(LearnerError::InvalidConfig(
                "target_sync_interval must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(LearnerError::InvalidConfig(format!(
                "epsilon {} outside [0, 1]",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// `value * 2^exp`, or `InvalidConfig` on overflow.
fn scale_pow2(value: usize, exp: usize, name: &str) -> Result<usize, LearnerError> {
    u32::try_from(exp)
        .ok()
        .and_then(|e| 1usize.checked_shl(e))
        .and_then(|factor| value.checked_mul(factor))
        .ok_or_else(|| {
            LearnerError::InvalidConfig(format!(
                "{name} {value} scaled by 2^{exp} for counterfactuals overflows"
            ))
        })
}

pub struct DqnAgent<Q: QFunction = Mlp> {
    eval: Q,
    target: Q,
    replay: ReplayStore,
    config: DqnConfig,
    rng: ChaCha8Rng,
    epsilon: f64,
    learn_steps: u64,
}

impl DqnAgent<Mlp> {
    /// Agent over a freshly initialised [`Mlp`]; the target starts as a copy
    /// of the evaluation network.
    pub fn new(input_dim: usize, num_actions: usize, config: DqnConfig) -> Result<Self, LearnerError> {
        if input_dim == 0 || num_actions == 0 {
            return Err(LearnerError::InvalidConfig(format!(
                "network needs positive input ({input_dim}) and action ({num_actions}) counts"
            )));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let eval = Mlp::new(
            input_dim,
            &config.hidden,
            num_actions,
            config.learning_rate,
            &mut rng,
        );
        Self::with_network(eval, config, rng)
    }
}

impl<Q: QFunction> DqnAgent<Q> {
    pub fn with_network(eval: Q, config: DqnConfig, rng: ChaCha8Rng) -> Result<Self, LearnerError> {
        config.validate()?;
        let replay = ReplayStore::new(config.memory_capacity)?;
        let target = eval.clone();
        Ok(Self {
            eval,
            target,
            replay,
            epsilon: config.epsilon,
            config,
            rng,
            learn_steps: 0,
        })
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn learn_steps(&self) -> u64 {
        self.learn_steps
    }

    pub fn replay(&self) -> &ReplayStore {
        &self.replay
    }

    pub fn replay_mut(&mut self) -> &mut ReplayStore {
        &mut self.replay
    }

    pub fn eval_network(&self) -> &Q {
        &self.eval
    }

    pub fn target_network(&self) -> &Q {
        &self.target
    }

    /// Multiplicative decay, applied once per training episode while above
    /// the floor.
    pub fn decay_epsilon(&mut self) {
        if self.epsilon > self.config.epsilon_floor {
            self.epsilon *= self.config.epsilon_decay;
        }
    }

    fn check_input(&self, input: &[f32]) -> Result<(), LearnerError> {
        let expected = self.eval.input_dim();
        if input.len() != expected {
            return Err(LearnerError::DimensionMismatch {
                expected,
                got: input.len(),
            });
        }
        Ok(())
    }
}

impl<Q: QFunction> Learner for DqnAgent<Q> {
    /// Greedy selection reads the target network; exploratory selection
    /// reads the evaluation network.
    fn select_action(&mut self, input: &[f32], greedy: bool) -> Result<usize, LearnerError> {
        self.check_input(input)?;
        if greedy {
            return Ok(argmax(&self.target.q_values(input)));
        }
        if self.rng.random::<f64>() >= self.epsilon {
            Ok(argmax(&self.eval.q_values(input)))
        } else {
            Ok(self.rng.random_range(0..self.eval.num_actions()))
        }
    }

    fn observe(&mut self, transition: Transition) {
        self.replay.store(transition);
    }

    fn learn(&mut self) -> Result<f32, LearnerError> {
        if !self.replay.is_filled() {
            return Err(ReplayError::NotFilled {
                written: self.replay.write_count(),
                capacity: self.replay.capacity(),
            }
            .into());
        }
        if self.learn_steps % self.config.target_sync_interval == 0 {
            self.target.copy_weights_from(&self.eval);
            debug!(learn_steps = self.learn_steps, "target network synced");
        }
        self.learn_steps += 1;

        let batch = self.replay.sample(self.config.batch_size, &mut self.rng)?;
        let mut inputs = Vec::with_capacity(batch.len());
        let mut actions = Vec::with_capacity(batch.len());
        let mut targets = Vec::with_capacity(batch.len());
        for t in batch {
            let max_next = self
                .target
                .q_values(&t.next_input())
                .into_iter()
                .fold(f32::NEG_INFINITY, f32::max);
            targets.push(t.reward + self.config.gamma * max_next);
            inputs.push(t.input());
            actions.push(t.action);
        }

        Ok(self.eval.fit(&inputs, &actions, &targets))
    }
}
