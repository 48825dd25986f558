//! Observation encodings for the donut environment.
//!
//! An observation has two halves: the availability part (who can receive a
//! donut right now) and the memory part (how many donuts each recipient has
//! effectively claimed). Every [`StateMode`] picks one projection for each.
//!
//! Count vectors handed to the encoder are always in `[0, episode_length]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::EnvError;

/// State representation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateMode {
    /// Availability bitmask + raw memory vector.
    Full,
    /// Availability vector + raw memory vector.
    Deep,
    /// Availability vector + memory shifted so its minimum is zero.
    DeepReset,
    /// Availability bitmask + mixed-radix memory integer.
    Compact,
    /// Like `Compact`, on min-shifted memory.
    Reset,
    /// Like `Compact`, collapsing perfectly equal memory to zero first.
    EqualReset,
    /// Availability vector + fixed-width binary memory.
    Binary,
    /// Like `Binary`, on min-shifted memory.
    ResetBinary,
    /// Like `Binary`, collapsing perfectly equal memory to zero first.
    EqualBinary,
    /// Availability vector only; history is left to a recurrent learner.
    Rnn,
}

impl StateMode {
    pub const ALL: [StateMode; 10] = [
        StateMode::Full,
        StateMode::Deep,
        StateMode::DeepReset,
        StateMode::Compact,
        StateMode::Reset,
        StateMode::EqualReset,
        StateMode::Binary,
        StateMode::ResetBinary,
        StateMode::EqualBinary,
        StateMode::Rnn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateMode::Full => "full",
            StateMode::Deep => "deep",
            StateMode::DeepReset => "deep-reset",
            StateMode::Compact => "compact",
            StateMode::Reset => "reset",
            StateMode::EqualReset => "equal-reset",
            StateMode::Binary => "binary",
            StateMode::ResetBinary => "reset-binary",
            StateMode::EqualBinary => "equal-binary",
            StateMode::Rnn => "rnn",
        }
    }

    /// Whether the availability half is the raw 0/1 vector rather than a
    /// packed bitmask.
    pub fn availability_as_vector(self) -> bool {
        !matches!(
            self,
            StateMode::Full | StateMode::Compact | StateMode::Reset | StateMode::EqualReset
        )
    }

    /// How the memory vector is normalised in place before encoding.
    fn normalisation(self) -> Normalisation {
        match self {
            StateMode::DeepReset | StateMode::Reset | StateMode::ResetBinary => {
                Normalisation::SubtractMin
            }
            StateMode::EqualReset | StateMode::EqualBinary => Normalisation::CollapseEqual,
            _ => Normalisation::None,
        }
    }

    fn memory_layout(self) -> MemoryLayout {
        match self {
            StateMode::Full | StateMode::Deep | StateMode::DeepReset => MemoryLayout::Raw,
            StateMode::Compact | StateMode::Reset | StateMode::EqualReset => MemoryLayout::Radix,
            StateMode::Binary | StateMode::ResetBinary | StateMode::EqualBinary => {
                MemoryLayout::Bits
            }
            StateMode::Rnn => MemoryLayout::Empty,
        }
    }
}

impl fmt::Display for StateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateMode {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| EnvError::UnknownStateMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Normalisation {
    None,
    SubtractMin,
    CollapseEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryLayout {
    Raw,
    Radix,
    Bits,
    Empty,
}

/// Encoder bound to one mode, population and episode length.
///
/// Radix and bit width are derived once here. An encoder for a different
/// episode length must be built anew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEncoder {
    mode: StateMode,
    people: usize,
    radix: u64,
    bit_width: u32,
}

impl StateEncoder {
    pub fn new(mode: StateMode, people: usize, episode_length: usize) -> Result<Self, EnvError> {
        if people == 0 {
            return Err(EnvError::InvalidConfig("people must be positive".into()));
        }
        if episode_length == 0 {
            return Err(EnvError::InvalidConfig(
                "episode_length must be positive".into(),
            ));
        }
        let radix = episode_length as u64 + 1;
        if mode.memory_layout() == MemoryLayout::Radix {
            let exp = u32::try_from(people)
                .map_err(|_| EnvError::InvalidConfig("population too large".into()))?;
            radix.checked_pow(exp).ok_or_else(|| {
                EnvError::InvalidConfig(format!(
                    "compact encoding of {people} recipients at episode length {episode_length} overflows u64"
                ))
            })?;
        }
        if !mode.availability_as_vector() && people > 63 {
            return Err(EnvError::InvalidConfig(format!(
                "availability bitmask cannot hold {people} recipients"
            )));
        }
        Ok(Self {
            mode,
            people,
            radix,
            bit_width: bit_width(episode_length),
        })
    }

    pub fn mode(&self) -> StateMode {
        self.mode
    }

    pub fn people(&self) -> usize {
        self.people
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn radix(&self) -> u64 {
        self.radix
    }

    /// Encode the availability half.
    pub fn encode_availability(&self, availability: &[bool]) -> Vec<u64> {
        if self.mode.availability_as_vector() {
            availability.iter().map(|&a| u64::from(a)).collect()
        } else {
            vec![bitmask(availability)]
        }
    }

    /// Apply the mode's normalisation to `memory` in place, then encode a
    /// copy of the result.
    pub fn normalise_and_encode(&self, memory: &mut [u64]) -> Vec<u64> {
        match self.mode.normalisation() {
            Normalisation::None => {}
            Normalisation::SubtractMin => subtract_min(memory),
            Normalisation::CollapseEqual => collapse_equal(memory),
        }
        self.encode_memory(memory)
    }

    /// Encode an already-normalised memory vector.
    pub fn encode_memory(&self, memory: &[u64]) -> Vec<u64> {
        match self.mode.memory_layout() {
            MemoryLayout::Raw => memory.to_vec(),
            MemoryLayout::Radix => vec![encode_radix(memory, self.radix)],
            MemoryLayout::Bits => encode_bits(memory, self.bit_width),
            MemoryLayout::Empty => Vec::new(),
        }
    }

    /// Inverse of the radix encoding for this encoder's population.
    pub fn decode_radix(&self, mut value: u64) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.people);
        for _ in 0..self.people {
            out.push(value % self.radix);
            value /= self.radix;
        }
        out
    }

    /// Width of the memory half for this configuration.
    pub fn memory_len(&self) -> usize {
        match self.mode.memory_layout() {
            MemoryLayout::Raw => self.people,
            MemoryLayout::Radix => 1,
            MemoryLayout::Bits => self.people * self.bit_width as usize,
            MemoryLayout::Empty => 0,
        }
    }

    /// Width of the availability half for this configuration.
    pub fn availability_len(&self) -> usize {
        if self.mode.availability_as_vector() {
            self.people
        } else {
            1
        }
    }
}

/// Bits per recipient, enough to hold every count in `[0, episode_length]`.
pub fn bit_width(episode_length: usize) -> u32 {
    let values = episode_length as u64 + 1;
    let width = u64::BITS - (values - 1).leading_zeros();
    width.max(1)
}

fn bitmask(availability: &[bool]) -> u64 {
    availability
        .iter()
        .enumerate()
        .filter(|(_, a)| **a)
        .fold(0u64, |acc, (i, _)| acc | (1 << i))
}

fn encode_radix(memory: &[u64], radix: u64) -> u64 {
    let mut value = 0u64;
    let mut place = 1u64;
    for &digit in memory {
        value += digit * place;
        place = place.saturating_mul(radix);
    }
    value
}

fn encode_bits(memory: &[u64], width: u32) -> Vec<u64> {
    let mut out = Vec::with_capacity(memory.len() * width as usize);
    for &count in memory {
        for bit in (0..width).rev() {
            out.push((count >> bit) & 1);
        }
    }
    out
}

fn subtract_min(memory: &mut [u64]) {
    if let Some(&min) = memory.iter().min() {
        memory.iter_mut().for_each(|m| *m -= min);
    }
}

fn collapse_equal(memory: &mut [u64]) {
    let min = memory.iter().min();
    let max = memory.iter().max();
    if min == max {
        memory.iter_mut().for_each(|m| *m = 0);
    }
}
