//! Error types for the optimization core
//!
//! Insufficient data is never an error here: predictors and scalers return
//! `None` for that case. Errors are reserved for invalid configuration and
//! for failures crossing the infrastructure seam.

use thiserror::Error;

/// Errors raised by the fleet optimization core
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scaling constraints for {service}: {reason}")]
    InvalidConstraints { service: String, reason: String },

    #[error("Execution failed for {service}: {reason}")]
    Execution { service: String, reason: String },
}

impl FleetError {
    /// Shorthand for configuration validation failures
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        FleetError::InvalidConfig(reason.into())
    }
}

/// Result alias for the optimization core
pub type Result<T> = std::result::Result<T, FleetError>;
