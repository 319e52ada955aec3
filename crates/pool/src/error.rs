use std::error::Error;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("invalid pool options: min {min}, max {max}")]
    InvalidOptions { min: usize, max: usize },

    #[error("failed to spawn execution unit: {source}")]
    Spawn {
        #[from]
        source: io::Error,
    },

    #[error("execution unit {unit} failed: {reason}")]
    UnitFailure { unit: usize, reason: String },

    #[error("job failed: {source}")]
    Job { source: Box<dyn Error + Send + Sync> },

    #[error("pool is terminated")]
    Terminated,
}

impl PoolError {
    pub fn already_exists<S: ToString>(name: S) -> Self {
        Self::AlreadyExists { name: name.to_string() }
    }

    pub fn invalid_options(min: usize, max: usize) -> Self {
        Self::InvalidOptions { min, max }
    }

    pub fn unit_failure<S: ToString>(unit: usize, reason: S) -> Self {
        Self::UnitFailure { unit, reason: reason.to_string() }
    }

    pub fn job<E: Into<Box<dyn Error + Send + Sync>>>(source: E) -> Self {
        Self::Job { source: source.into() }
    }
}
