//! Crate-level error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::forms::ValidationError;
use crate::sensor::SensorError;
use crate::store::StoreError;

/// Errors surfaced by TripGauge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Location sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;
