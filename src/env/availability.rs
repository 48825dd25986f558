//! Stochastic eligibility of recipients.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::EnvError;

/// How likely each recipient is to be eligible at a given step.
///
/// The time-varying schedules carry two per-recipient shape parameters each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AvailabilitySchedule {
    /// Every recipient is always eligible; no draws are made.
    #[default]
    Always,
    /// Fixed per-recipient probability.
    Bernoulli { probs: Vec<f64> },
    /// `1 / (1 + exp(-steepness * (t - midpoint)))`.
    Logistic {
        midpoint: Vec<f64>,
        steepness: Vec<f64>,
    },
    /// `exp(-(t - mean)^2 / (2 * spread^2))`.
    Bell { mean: Vec<f64>, spread: Vec<f64> },
    /// Eligible with certainty inside `[start, end]`, never outside.
    UniformInterval { start: Vec<f64>, end: Vec<f64> },
}

impl AvailabilitySchedule {
    pub fn is_stochastic(&self) -> bool {
        !matches!(self, AvailabilitySchedule::Always)
    }

    pub fn validate(&self, people: usize) -> Result<(), EnvError> {
        let check_len = |name: &str, v: &[f64]| {
            if v.len() == people {
                Ok(())
            } else {
                Err(EnvError::InvalidConfig(format!(
                    "{name} has {} entries, expected {people}",
                    v.len()
                )))
            }
        };
        match self {
            AvailabilitySchedule::Always => Ok(()),
            AvailabilitySchedule::Bernoulli { probs } => {
                check_len("probs", probs)?;
                if let Some(p) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                    return Err(EnvError::InvalidConfig(format!(
                        "probability {p} outside [0, 1]"
                    )));
                }
                Ok(())
            }
            AvailabilitySchedule::Logistic {
                midpoint,
                steepness,
            } => {
                check_len("midpoint", midpoint)?;
                check_len("steepness", steepness)
            }
            AvailabilitySchedule::Bell { mean, spread } => {
                check_len("mean", mean)?;
                check_len("spread", spread)?;
                if spread.iter().any(|s| *s == 0.0) {
                    return Err(EnvError::InvalidConfig("bell spread must be non-zero".into()));
                }
                Ok(())
            }
            AvailabilitySchedule::UniformInterval { start, end } => {
                check_len("start", start)?;
                check_len("end", end)
            }
        }
    }

    /// Eligibility probability of `recipient` at episode time `t`.
    pub fn probability(&self, recipient: usize, t: usize) -> f64 {
        let t = t as f64;
        match self {
            AvailabilitySchedule::Always => 1.0,
            AvailabilitySchedule::Bernoulli { probs } => probs[recipient],
            AvailabilitySchedule::Logistic {
                midpoint,
                steepness,
            } => 1.0 / (1.0 + (-steepness[recipient] * (t - midpoint[recipient])).exp()),
            AvailabilitySchedule::Bell { mean, spread } => {
                let d = t - mean[recipient];
                (-(d * d) / (2.0 * spread[recipient] * spread[recipient])).exp()
            }
            AvailabilitySchedule::UniformInterval { start, end } => {
                if t >= start[recipient] && t <= end[recipient] {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Draw a fresh availability vector at time `t` into `out`.
    ///
    /// One uniform draw per recipient; eligible iff the draw is at most the
    /// current probability.
    pub fn draw<R: Rng>(&self, t: usize, rng: &mut R, out: &mut [bool]) {
        if !self.is_stochastic() {
            out.iter_mut().for_each(|a| *a = true);
            return;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            let u: f64 = rng.random();
            *slot = u <= self.probability(i, t);
        }
    }
}
