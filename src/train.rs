// donut-rl/src/train.rs
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::env::{DonutConfig, DonutEnv, Env, EnvError};
use crate::learner::{DqnAgent, DqnConfig, Learner, LearnerError, QFunction};
use crate::replay::{CounterfactualAugmenter, Transition};

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error("learner error: {0}")]
    Learner(#[from] LearnerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub episodes: u64,
    pub repetitions: usize,
    /// Emit a progress line every this many episodes.
    pub log_every: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 50_000,
            repetitions: 1,
            log_every: 1000,
        }
    }
}

/// Everything one experiment needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub env: DonutConfig,
    pub dqn: DqnConfig,
    pub train: TrainConfig,
}

impl ExperimentConfig {
    /// Agent config after counterfactual scaling of batch and replay sizes.
    pub fn effective_dqn(&self) -> Result<DqnConfig, LearnerError> {
        self.dqn.clone().scaled_for_counterfactuals(self.env.people)
    }

    /// Config of repetition `i`: env seed `env.seed + i`, agent seed
    /// `dqn.seed + i`.
    pub fn repetition(&self, i: usize) -> Self {
        let mut rep = self.clone();
        rep.env.seed = self.env.seed.wrapping_add(i as u64);
        rep.dqn.seed = self.dqn.seed.wrapping_add(i as u64);
        rep
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    pub reward: f64,
    /// Steps whose action was not dropped.
    pub allocations: u64,
    pub donuts: Vec<u64>,
    pub steps: u64,
}

#[derive(Debug, Clone)]
pub struct TrainingStats {
    /// Greedy evaluation reward per episode.
    pub episode_rewards: Vec<f64>,
    /// Greedy evaluation allocations per episode.
    pub episode_allocations: Vec<u64>,
    pub total_steps: u64,
    pub learn_steps: u64,
    pub final_epsilon: f64,
    pub training_time: Duration,
}

/// One exploratory episode: act, store the real transition, expand it
/// counterfactually when enabled, and learn once replay has filled.
pub fn train_episode<Q: QFunction>(
    env: &mut DonutEnv,
    agent: &mut DqnAgent<Q>,
    augmenter: Option<&CounterfactualAugmenter>,
) -> Result<EpisodeOutcome, TrainError> {
    let mut obs = env.reset(None)?;
    let mut outcome = EpisodeOutcome {
        reward: 0.0,
        allocations: 0,
        donuts: Vec::new(),
        steps: 0,
    };

    loop {
        let action = agent.select_action(&obs.to_input(), false)?;
        let actual_memory = env.memory();
        let (next_obs, reward, done, _) = env.step(action)?;

        // real transition first, then its counterfactual siblings
        let transition = Transition::new(&obs, action, reward, &next_obs);
        match augmenter {
            Some(aug) => {
                agent.observe(transition.clone());
                aug.augment(&transition, &actual_memory, agent.replay_mut());
            }
            None => agent.observe(transition),
        }

        outcome.reward += reward as f64;
        outcome.steps += 1;
        if reward != 0.0 {
            outcome.allocations += 1;
        }

        if agent.replay().is_filled() {
            agent.learn()?;
        }
        if done {
            break;
        }
        obs = next_obs;
    }

    outcome.donuts = env.donuts();
    Ok(outcome)
}

/// One greedy episode with no learning.
pub fn evaluate_episode<Q: QFunction>(
    env: &mut DonutEnv,
    agent: &mut DqnAgent<Q>,
) -> Result<EpisodeOutcome, TrainError> {
    let mut obs = env.reset(None)?;
    let mut outcome = EpisodeOutcome {
        reward: 0.0,
        allocations: 0,
        donuts: Vec::new(),
        steps: 0,
    };
    loop {
        let action = agent.select_action(&obs.to_input(), true)?;
        let (next_obs, reward, done, _) = env.step(action)?;
        outcome.reward += reward as f64;
        outcome.steps += 1;
        if reward != 0.0 {
            outcome.allocations += 1;
        }
        if done {
            break;
        }
        obs = next_obs;
    }
    outcome.donuts = env.donuts();
    Ok(outcome)
}

/// Train one agent for `config.train.episodes` episodes. Each episode is an
/// exploratory training pass, an epsilon decay, then a greedy evaluation pass
/// whose reward and allocation count are recorded.
pub fn train(config: &ExperimentConfig) -> Result<TrainingStats, TrainError> {
    let start = Instant::now();
    let mut env = DonutEnv::new(config.env.clone())?;
    let input_dim = env.reset(None)?.len();
    let mut agent = DqnAgent::new(input_dim, env.people(), config.effective_dqn()?)?;
    let augmenter = agent
        .config()
        .counterfactual
        .then(|| CounterfactualAugmenter::for_env(&env, agent.config().num_updates));

    info!(
        people = env.people(),
        episode_length = env.episode_length(),
        mode = %env.encoder().mode(),
        input_dim,
        counterfactual = augmenter.is_some(),
        "collecting experience"
    );

    let mut stats = TrainingStats {
        episode_rewards: Vec::with_capacity(config.train.episodes as usize),
        episode_allocations: Vec::with_capacity(config.train.episodes as usize),
        total_steps: 0,
        learn_steps: 0,
        final_epsilon: agent.epsilon(),
        training_time: Duration::ZERO,
    };

    for episode in 0..config.train.episodes {
        let trained = train_episode(&mut env, &mut agent, augmenter.as_ref())?;
        agent.decay_epsilon();
        let eval = evaluate_episode(&mut env, &mut agent)?;

        stats.total_steps += trained.steps + eval.steps;
        stats.episode_rewards.push(eval.reward);
        stats.episode_allocations.push(eval.allocations);

        if config.train.log_every > 0 && episode % config.train.log_every == 0 {
            info!(
                episode,
                train_reward = trained.reward,
                eval_reward = eval.reward,
                allocations = eval.allocations,
                epsilon = agent.epsilon(),
                donuts = ?eval.donuts,
                "episode finished"
            );
        } else {
            debug!(episode, eval_reward = eval.reward, "episode finished");
        }
    }

    stats.learn_steps = agent.learn_steps();
    stats.final_epsilon = agent.epsilon();
    stats.training_time = start.elapsed();
    Ok(stats)
}

/// Independent repetitions, each seeded by [`ExperimentConfig::repetition`].
pub fn run_repetitions(config: &ExperimentConfig) -> Result<Vec<TrainingStats>, TrainError> {
    (0..config.train.repetitions)
        .map(|i| {
            let rep = config.repetition(i);
            info!(
                repetition = i,
                env_seed = rep.env.seed,
                agent_seed = rep.dqn.seed,
                "starting repetition"
            );
            train(&rep)
        })
        .collect()
}
