//! Run log output and summary statistics across repetitions.
//!
//! Log layout (comma separated, no quoting):
//!
//! ```text
//! episodes,people,maxeplen,learning rate,batch size
//! <episodes>,<people>,<episode_length>,<lr>,<batch>
//! <rewards of repetition 0>
//!
//! <allocations of repetition 0>
//! <rewards of repetition 1>
//! ...
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::train::{ExperimentConfig, TrainingStats};

pub const HEADER: [&str; 5] = ["episodes", "people", "maxeplen", "learning rate", "batch size"];

/// `<mode>-people<P>-cf<bool>-<run_id>.csv`
pub fn run_log_file_name(config: &ExperimentConfig, run_id: &Uuid) -> String {
    format!(
        "{}-people{}-cf{}-{}.csv",
        config.env.state_mode, config.env.people, config.dqn.counterfactual, run_id
    )
}

pub fn write_run_log<W: Write>(
    mut out: W,
    config: &ExperimentConfig,
    runs: &[TrainingStats],
) -> io::Result<()> {
    let dqn = config
        .effective_dqn()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    writeln!(out, "{}", HEADER.join(","))?;
    writeln!(
        out,
        "{},{},{},{},{}",
        config.train.episodes,
        config.env.people,
        config.env.episode_length,
        dqn.learning_rate,
        dqn.batch_size
    )?;
    for run in runs {
        writeln!(out, "{}", join(&run.episode_rewards))?;
        writeln!(out)?;
        writeln!(out, "{}", join(&run.episode_allocations))?;
    }
    out.flush()
}

/// Write the log under `dir`, creating it if needed. Returns the file path.
pub fn save_run_log(
    dir: &Path,
    run_id: &Uuid,
    config: &ExperimentConfig,
    runs: &[TrainingStats],
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(run_log_file_name(config, run_id));
    let file = File::create(&path)?;
    write_run_log(BufWriter::new(file), config, runs)?;
    info!(path = %path.display(), repetitions = runs.len(), "run log written");
    Ok(path)
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Windowed mean with a 95% confidence half-width across repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceBand {
    /// First episode of each window.
    pub episode: Vec<usize>,
    pub mean: Vec<f64>,
    pub half_width: Vec<f64>,
}

/// Average each repetition over consecutive windows of `window` episodes,
/// then take mean and `1.96 * std / sqrt(n)` across repetitions. Series are
/// truncated to the shortest one.
pub fn confidence_band(series: &[Vec<f64>], window: usize) -> ConfidenceBand {
    let window = window.max(1);
    let len = series.iter().map(Vec::len).min().unwrap_or(0);
    let n = series.len() as f64;

    let windowed: Vec<Vec<f64>> = series
        .iter()
        .map(|s| {
            s[..len]
                .chunks(window)
                .map(|c| c.iter().sum::<f64>() / c.len() as f64)
                .collect()
        })
        .collect();

    let buckets = len.div_ceil(window);
    let mut band = ConfidenceBand {
        episode: (0..buckets).map(|b| b * window).collect(),
        mean: Vec::with_capacity(buckets),
        half_width: Vec::with_capacity(buckets),
    };
    for b in 0..buckets {
        let mean = windowed.iter().map(|w| w[b]).sum::<f64>() / n;
        let var = windowed.iter().map(|w| (w[b] - mean).powi(2)).sum::<f64>() / n;
        band.mean.push(mean);
        band.half_width.push(1.96 * var.sqrt() / n.sqrt());
    }
    band
}

/// Reward and allocation bands for a set of repetitions.
pub fn summarize(runs: &[TrainingStats], window: usize) -> (ConfidenceBand, ConfidenceBand) {
    let rewards: Vec<Vec<f64>> = runs.iter().map(|r| r.episode_rewards.clone()).collect();
    let allocations: Vec<Vec<f64>> = runs
        .iter()
        .map(|r| r.episode_allocations.iter().map(|&a| a as f64).collect())
        .collect();
    (
        confidence_band(&rewards, window),
        confidence_band(&allocations, window),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stats(rewards: Vec<f64>, allocations: Vec<u64>) -> TrainingStats {
        TrainingStats {
            episode_rewards: rewards,
            episode_allocations: allocations,
            total_steps: 0,
            learn_steps: 0,
            final_epsilon: 1.0,
            training_time: Duration::ZERO,
        }
    }

    #[test]
    fn log_layout_matches_schema() {
        let mut config = ExperimentConfig::default();
        config.train.episodes = 2;
        let runs = vec![stats(vec![1.5, 2.0], vec![3, 4]), stats(vec![0.5, 1.0], vec![1, 2])];
        let mut buf = Vec::new();
        write_run_log(&mut buf, &config, &runs).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "episodes,people,maxeplen,learning rate,batch size",
                "2,5,100,0.0001,64",
                "1.5,2",
                "",
                "3,4",
                "0.5,1",
                "",
                "1,2",
            ]
        );
    }

    #[test]
    fn counterfactual_batch_is_reported_scaled() {
        let mut config = ExperimentConfig::default();
        config.dqn.counterfactual = true;
        let mut buf = Vec::new();
        write_run_log(&mut buf, &config, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().nth(1), Some("50000,5,100,0.0001,2048"));
    }

    #[test]
    fn file_name_uses_run_id() {
        let config = ExperimentConfig::default();
        let id = Uuid::nil();
        assert_eq!(
            run_log_file_name(&config, &id),
            "deep-people5-cffalse-00000000-0000-0000-0000-000000000000.csv"
        );
    }

    #[test]
    fn band_of_identical_runs_has_zero_width() {
        let series = vec![vec![1.0, 3.0, 5.0], vec![1.0, 3.0, 5.0]];
        let band = confidence_band(&series, 2);
        assert_eq!(band.episode, vec![0, 2]);
        assert_eq!(band.mean, vec![2.0, 5.0]);
        assert_eq!(band.half_width, vec![0.0, 0.0]);
    }

    #[test]
    fn band_width_follows_spread() {
        let series = vec![vec![0.0], vec![2.0]];
        let band = confidence_band(&series, 10);
        assert_eq!(band.mean, vec![1.0]);
        // std 1, n 2
        assert!((band.half_width[0] - 1.96 / 2f64.sqrt()).abs() < 1e-12);
    }
}
