//! The donut allocation environment.
//!
//! Each step hands one donut to one recipient. Recipients that are not
//! currently eligible waste the action. The reward is the Nash social welfare
//! surrogate `sum_i ln(donuts_i + 1 + eps)` over the post-step allocation.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::availability::AvailabilitySchedule;
use super::encoding::{StateEncoder, StateMode};
use super::errors::EnvError;
use super::traits::Env;
use super::types::{Observation, StepInfo};

/// Smoothing term keeping the welfare logarithm finite at zero allocation.
pub const NSW_EPSILON: f64 = 1e-4;

/// `sum_i ln(counts_i + 1 + eps)`.
pub fn nsw_reward(counts: &[u64], eps: f64) -> f64 {
    counts.iter().map(|&c| (c as f64 + 1.0 + eps).ln()).sum()
}

/// Default eligibility probability for every recipient.
pub const DEFAULT_AVAILABILITY: f64 = 0.8;

/// Missing fields take their defaults. When `availability` is missing the
/// default Bernoulli schedule is sized to `people`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DonutConfigFile")]
pub struct DonutConfig {
    pub people: usize,
    pub episode_length: usize,
    pub seed: u64,
    pub state_mode: StateMode,
    pub availability: AvailabilitySchedule,
    /// Keep memory at zero while donuts still accumulate.
    pub zero_memory: bool,
}

impl Default for DonutConfig {
    fn default() -> Self {
        let people = 5;
        Self {
            people,
            episode_length: 100,
            seed: 2024,
            state_mode: StateMode::Deep,
            availability: default_availability(people),
            zero_memory: false,
        }
    }
}

fn default_availability(people: usize) -> AvailabilitySchedule {
    AvailabilitySchedule::Bernoulli {
        probs: vec![DEFAULT_AVAILABILITY; people],
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct DonutConfigFile {
    people: usize,
    episode_length: usize,
    seed: u64,
    state_mode: StateMode,
    availability: Option<AvailabilitySchedule>,
    zero_memory: bool,
}

impl Default for DonutConfigFile {
    fn default() -> Self {
        let d = DonutConfig::default();
        Self {
            people: d.people,
            episode_length: d.episode_length,
            seed: d.seed,
            state_mode: d.state_mode,
            availability: None,
            zero_memory: d.zero_memory,
        }
    }
}

impl From<DonutConfigFile> for DonutConfig {
    fn from(file: DonutConfigFile) -> Self {
        Self {
            availability: file
                .availability
                .unwrap_or_else(|| default_availability(file.people)),
            people: file.people,
            episode_length: file.episode_length,
            seed: file.seed,
            state_mode: file.state_mode,
            zero_memory: file.zero_memory,
        }
    }
}

impl DonutConfig {
    /// Every recipient always eligible (no drops, no draws).
    pub fn deterministic(people: usize, episode_length: usize, state_mode: StateMode) -> Self {
        Self {
            people,
            episode_length,
            state_mode,
            availability: AvailabilitySchedule::Always,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct DonutEnv {
    config: DonutConfig,
    encoder: StateEncoder,
    rng: ChaCha8Rng,
    donuts: Vec<u64>,
    memory: Vec<u64>,
    last_obs: Vec<bool>,
    clock: usize,
}

impl DonutEnv {
    /// Validates the configuration and returns the environment already reset
    /// with the configured seed.
    pub fn new(config: DonutConfig) -> Result<Self, EnvError> {
        let encoder = StateEncoder::new(config.state_mode, config.people, config.episode_length)?;
        config.availability.validate(config.people)?;

        let mut env = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            donuts: vec![0; config.people],
            memory: vec![0; config.people],
            last_obs: vec![true; config.people],
            clock: 0,
            encoder,
            config,
        };
        let seed = env.config.seed;
        env.reset(Some(seed))?;
        Ok(env)
    }

    pub fn config(&self) -> &DonutConfig {
        &self.config
    }

    pub fn encoder(&self) -> &StateEncoder {
        &self.encoder
    }

    pub fn people(&self) -> usize {
        self.config.people
    }

    pub fn episode_length(&self) -> usize {
        self.config.episode_length
    }

    pub fn is_stochastic(&self) -> bool {
        self.config.availability.is_stochastic()
    }

    pub fn clock(&self) -> usize {
        self.clock
    }

    pub fn is_done(&self) -> bool {
        self.clock >= self.config.episode_length
    }

    pub fn donuts(&self) -> Vec<u64> {
        self.donuts.clone()
    }

    pub fn memory(&self) -> Vec<u64> {
        self.memory.clone()
    }

    pub fn availability(&self) -> Vec<bool> {
        self.last_obs.clone()
    }

    /// Width of `state ++ memory` fed to a learner.
    pub fn observation_len(&self) -> usize {
        self.encoder.availability_len() + self.encoder.memory_len()
    }

    fn observe(&mut self) -> Observation {
        let state = self.encoder.encode_availability(&self.last_obs);
        let memory = self.encoder.normalise_and_encode(&mut self.memory);
        Observation { state, memory }
    }
}

impl Env for DonutEnv {
    type Obs = Observation;
    type Act = usize;
    type Info = StepInfo;

    fn reset(&mut self, seed: Option<u64>) -> Result<Observation, EnvError> {
        if let Some(seed) = seed {
            self.config.seed = seed;
            self.rng = ChaCha8Rng::seed_from_u64(seed);
        }
        self.donuts.iter_mut().for_each(|d| *d = 0);
        self.memory.iter_mut().for_each(|m| *m = 0);
        self.clock = 0;
        self.config
            .availability
            .draw(0, &mut self.rng, &mut self.last_obs);

        debug!(seed = ?seed, availability = ?self.last_obs, "donut env reset");
        Ok(self.observe())
    }

    fn step(&mut self, action: usize) -> Result<(Observation, f32, bool, StepInfo), EnvError> {
        if action >= self.config.people {
            return Err(EnvError::InvalidAction {
                action,
                people: self.config.people,
            });
        }
        if self.is_done() {
            return Err(EnvError::EpisodeTerminated { clock: self.clock });
        }

        self.clock += 1;
        let done = self.clock >= self.config.episode_length;

        let dropped = !self.last_obs[action];
        if !dropped {
            self.donuts[action] += 1;
            if !self.config.zero_memory {
                self.memory[action] += 1;
            }
        }

        self.config
            .availability
            .draw(self.clock, &mut self.rng, &mut self.last_obs);

        let reward = if dropped {
            trace!(action, clock = self.clock, "action dropped");
            0.0
        } else {
            nsw_reward(&self.donuts, NSW_EPSILON) as f32
        };

        let obs = self.observe();
        Ok((obs, reward, done, serde_json::json!({})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(counts: &[u64]) -> f32 {
        nsw_reward(counts, NSW_EPSILON) as f32
    }

    #[test]
    fn reward_matches_welfare_formula() {
        let mut env = DonutEnv::new(DonutConfig::deterministic(3, 10, StateMode::Deep)).unwrap();
        env.step(0).unwrap();
        env.step(1).unwrap();
        let (_, reward, _, _) = env.step(0).unwrap();
        assert_eq!(env.donuts(), vec![2, 1, 0]);
        let want = (3.0 + NSW_EPSILON).ln() + (2.0 + NSW_EPSILON).ln() + (1.0 + NSW_EPSILON).ln();
        assert!((reward as f64 - want).abs() < 1e-5);
        assert_eq!(reward, expected(&[2, 1, 0]));
    }

    #[test]
    fn rejects_out_of_range_action() {
        let mut env = DonutEnv::new(DonutConfig::deterministic(2, 4, StateMode::Full)).unwrap();
        let err = env.step(2).unwrap_err();
        assert_eq!(err, EnvError::InvalidAction { action: 2, people: 2 });
        assert_eq!(env.clock(), 0);
    }

    #[test]
    fn zero_memory_keeps_memory_flat() {
        let config = DonutConfig {
            zero_memory: true,
            ..DonutConfig::deterministic(2, 4, StateMode::Deep)
        };
        let mut env = DonutEnv::new(config).unwrap();
        let (obs, _, _, _) = env.step(1).unwrap();
        assert_eq!(env.donuts(), vec![0, 1]);
        assert_eq!(env.memory(), vec![0, 0]);
        assert_eq!(obs.memory, vec![0, 0]);
    }

    #[test]
    fn json_people_sizes_default_availability() {
        let config: DonutConfig = serde_json::from_str(r#"{"people": 3}"#).unwrap();
        assert_eq!(
            config.availability,
            AvailabilitySchedule::Bernoulli {
                probs: vec![DEFAULT_AVAILABILITY; 3]
            }
        );
        let env = DonutEnv::new(config).unwrap();
        assert!(env.is_stochastic());
        assert_eq!(env.people(), 3);
    }

    #[test]
    fn json_availability_is_kept_as_given() {
        let json = r#"{"people": 2, "availability": {"kind": "always"}}"#;
        let config: DonutConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.availability, AvailabilitySchedule::Always);
        assert_eq!(config.episode_length, 100);
        assert!(!DonutEnv::new(config).unwrap().is_stochastic());
    }

    #[test]
    fn copies_do_not_alias_live_state() {
        let mut env = DonutEnv::new(DonutConfig::deterministic(2, 4, StateMode::Deep)).unwrap();
        let before = env.memory();
        env.step(0).unwrap();
        assert_eq!(before, vec![0, 0]);
        assert_eq!(env.memory(), vec![1, 0]);
    }

    #[test]
    fn observation_len_matches_encoded_width() {
        for mode in StateMode::ALL {
            let mut env = DonutEnv::new(DonutConfig::deterministic(3, 6, mode)).unwrap();
            let obs = env.reset(None).unwrap();
            assert_eq!(obs.len(), env.observation_len(), "mode {mode}");
        }
    }
}
