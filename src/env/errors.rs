use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("unknown state mode: {0}")]
    UnknownStateMode(String),

    #[error("invalid environment config: {0}")]
    InvalidConfig(String),

    #[error("action {action} out of range for {people} recipients")]
    InvalidAction { action: usize, people: usize },

    #[error("episode already terminated after {clock} steps; reset required")]
    EpisodeTerminated { clock: usize },
}
