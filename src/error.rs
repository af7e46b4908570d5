//! Error types for configuration and run management.
//!
//! Infeasibility (no path, nothing to deliver) is never reported through these
//! types: it shows up as empty routes and as penalty terms in the fitness.

use thiserror::Error;
use uuid::Uuid;

/// Rejected optimizer parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{name}` must be greater than zero")]
    ZeroCount { name: &'static str },

    #[error("`{name}` must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("`{name}` must be a finite, non-negative number, got {value}")]
    Negative { name: &'static str, value: f64 },
}

/// Failures reported by the run manager.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no run with id {0}")]
    UnknownRun(Uuid),

    #[error("run {id} failed: {message}")]
    Failed { id: Uuid, message: String },

    #[error("cannot start worker pool: {0}")]
    Pool(String),
}

pub(crate) fn ensure_positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroCount { name });
    }
    Ok(())
}

pub(crate) fn ensure_range(
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(())
}
