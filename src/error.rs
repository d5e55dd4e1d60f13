//! Error types shared by the simulator.

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while building or driving a simulation.
///
/// Everything except [`SimError::OutOfOrder`] and
/// [`SimError::TimestepOutOfRange`] is detected at construction time,
/// before the first timestep runs.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {}", join_config_errors(.0))]
    InvalidConfig(Vec<ConfigError>),

    #[error("input series `{series}` is empty")]
    EmptyHorizon { series: String },

    #[error("input series `{series}` has {actual} samples, expected {expected}")]
    LengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },

    #[error("got demand series for {actual} sockets, charger pool has {expected}")]
    SocketCountMismatch { expected: usize, actual: usize },

    #[error("timestep {timestep} is outside series `{series}` of length {len}")]
    TimestepOutOfRange {
        series: String,
        timestep: usize,
        len: usize,
    },

    #[error("timestep {got} requested, but the next step to run is {expected}")]
    OutOfOrder { expected: usize, got: usize },

    #[error("action carries {actual} socket fractions, pool has {expected} sockets")]
    ActionLength { expected: usize, actual: usize },
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for SimError {
    fn from(error: ConfigError) -> Self {
        Self::InvalidConfig(vec![error])
    }
}
