//! Error types for the simulator and the scenario loader
//!
//! - [`SimError`]    – raised while building or stepping a simulation
//! - [`ConfigError`] – raised while reading, parsing or validating a scenario file

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Rejected at construction: bad geometry, bad integrator setup, bad parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No free slot was found for a particle within the retry cap
    #[error("could not place particle {id} without overlap after {attempts} attempts")]
    Saturated { id: i64, attempts: usize },

    /// A particle state went non-finite after integration
    #[error("particle {id} diverged at t = {time}")]
    Diverged { id: i64, time: f64 },
}

impl SimError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SimError::InvalidConfig(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] SimError),
}

pub type SimResult<T> = Result<T, SimError>;
