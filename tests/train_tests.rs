// tests/train_tests.rs
//
// End-to-end training runs on tiny configurations.

use donut_rl::env::{AvailabilitySchedule, DonutConfig, DonutEnv, Env, StateMode};
use donut_rl::learner::{DqnAgent, DqnConfig};
use donut_rl::replay::CounterfactualAugmenter;
use donut_rl::report::{save_run_log, summarize};
use donut_rl::train::{ExperimentConfig, TrainConfig, run_repetitions, train, train_episode};
use uuid::Uuid;

fn tiny(mode: StateMode, counterfactual: bool) -> ExperimentConfig {
    ExperimentConfig {
        env: DonutConfig {
            people: 2,
            episode_length: 4,
            seed: 7,
            state_mode: mode,
            availability: AvailabilitySchedule::Bernoulli {
                probs: vec![0.8, 0.8],
            },
            zero_memory: false,
        },
        dqn: DqnConfig {
            learning_rate: 1e-3,
            batch_size: 4,
            memory_capacity: 8,
            target_sync_interval: 5,
            counterfactual,
            hidden: vec![8],
            seed: 8,
            ..DqnConfig::default()
        },
        train: TrainConfig {
            episodes: 5,
            repetitions: 1,
            log_every: 0,
        },
    }
}

#[test]
fn test_training_records_one_entry_per_episode() {
    let stats = train(&tiny(StateMode::Deep, false)).unwrap();
    assert_eq!(stats.episode_rewards.len(), 5);
    assert_eq!(stats.episode_allocations.len(), 5);
    // five training plus five evaluation episodes of four steps
    assert_eq!(stats.total_steps, 40);
    assert!(stats.learn_steps > 0);
    assert!(stats.final_epsilon < 1.0);
    assert!(stats.episode_allocations.iter().all(|&a| a <= 4));
}

#[test]
fn test_same_seed_same_learning_curve() {
    for counterfactual in [false, true] {
        let config = tiny(StateMode::Binary, counterfactual);
        let a = train(&config).unwrap();
        let b = train(&config).unwrap();
        assert_eq!(a.episode_rewards, b.episode_rewards, "cf {counterfactual}");
        assert_eq!(a.episode_allocations, b.episode_allocations);
        assert_eq!(a.learn_steps, b.learn_steps);
    }
}

#[test]
fn test_counterfactuals_fill_replay_sooner() {
    let plain = train(&tiny(StateMode::Deep, false)).unwrap();
    let cf = train(&tiny(StateMode::Deep, true)).unwrap();
    assert!(cf.learn_steps >= plain.learn_steps);
}

#[test]
fn test_every_state_mode_trains() {
    for mode in StateMode::ALL {
        let mut config = tiny(mode, false);
        config.train.episodes = 2;
        let stats = train(&config).unwrap();
        assert_eq!(stats.episode_rewards.len(), 2, "mode {mode}");
    }
}

#[test]
fn test_repetitions_write_one_log() {
    let mut config = tiny(StateMode::Compact, false);
    config.train.repetitions = 3;
    config.train.episodes = 3;
    let runs = run_repetitions(&config).unwrap();
    assert_eq!(runs.len(), 3);

    let (rewards, allocations) = summarize(&runs, 2);
    assert_eq!(rewards.mean.len(), 2);
    assert_eq!(allocations.episode, vec![0, 2]);

    let dir = std::env::temp_dir().join(format!("donut-rl-{}", Uuid::new_v4()));
    let run_id = Uuid::new_v4();
    let path = save_run_log(&dir, &run_id, &config, &runs).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_string_lossy(),
        format!("compact-people2-cffalse-{run_id}.csv")
    );

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2 + 3 * 3);
    assert_eq!(lines[1], "3,2,4,0.001,4");
    assert_eq!(lines[1 + 1].split(',').count(), 3);
    assert_eq!(lines[1 + 2], "");
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_real_transition_precedes_its_siblings() {
    let mut env = DonutEnv::new(DonutConfig::deterministic(2, 4, StateMode::Deep)).unwrap();
    let input_dim = env.reset(None).unwrap().len();
    let mut agent = DqnAgent::new(
        input_dim,
        2,
        DqnConfig {
            memory_capacity: 64,
            batch_size: 4,
            counterfactual: true,
            hidden: vec![4],
            ..DqnConfig::default()
        },
    )
    .unwrap();
    let aug = CounterfactualAugmenter::for_env(&env, 2);
    train_episode(&mut env, &mut agent, Some(&aug)).unwrap();

    let replay = agent.replay();
    // first step: one real write, then four siblings from memory [0, 0]
    assert_eq!(replay.get(0).unwrap().memory, vec![0, 0]);
    assert_eq!(replay.get(1).unwrap().memory, vec![1, 1]);
    let second = &replay.get(5).unwrap().memory;
    assert_eq!(second.iter().sum::<u64>(), 1);
    assert!(!replay.is_filled());
}

#[test]
fn test_repetitions_offset_both_seeds() {
    let mut config = tiny(StateMode::Deep, false);
    config.dqn.seed = 100;
    let rep = config.repetition(2);
    assert_eq!(rep.env.seed, 9);
    assert_eq!(rep.dqn.seed, 102);
    assert_eq!(config.repetition(0).dqn.seed, 100);
}

#[test]
fn test_oversized_counterfactual_population_fails_cleanly() {
    let mut config = tiny(StateMode::Deep, true);
    config.env.people = 64;
    config.env.availability = AvailabilitySchedule::Always;
    assert!(config.effective_dqn().is_err());
    assert!(train(&config).is_err());
}
