use crate::env::errors::EnvError;

/// Gym-style episodic environment.
pub trait Env {
    type Obs: Clone;
    type Act: Clone;
    type Info: Clone;

    /// Start a new episode, reseeding first when `seed` is given.
    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Obs, EnvError>;
    fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError>;
}
