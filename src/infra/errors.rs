// src/infra/errors.rs: Error types for wopbench

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    // Input errors (fatal, raised before any remote call)
    #[error("No actuator type selected: set a nonzero target for heaters, acs, windows or doors")]
    NoActuatorSelected,

    #[error("Configuration error: {0}")]
    Config(String),

    // Remote errors
    #[error("{operation}: transport failure: {message}")]
    Transport { operation: String, message: String },

    #[error("{operation}: simulator returned {status}: {message}")]
    Remote {
        operation: String,
        status: u16,
        message: String,
    },

    // Infra
    #[error("Result sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    pub fn transport(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SweepError::Transport {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            SweepError::Transport { .. } => true,
            SweepError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The message the simulator itself produced, without our operation prefix.
    pub fn remote_message(&self) -> String {
        match self {
            SweepError::Transport { message, .. } | SweepError::Remote { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}
