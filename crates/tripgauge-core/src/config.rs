//! Application configuration
//!
//! Stored as `tripgauge.json`. Every field has a default so a missing file or
//! a partial file both load cleanly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sensor::SubscribeOptions;

/// Configuration file name
pub const CONFIG_FILE: &str = "tripgauge.json";

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("'{field}' must be a positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("'smoothing_alpha' must be in (0, 1], got {0}")]
    AlphaOutOfRange(f64),
}

/// Sampling pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fixes with a worse (larger) accuracy radius than this are discarded
    pub accuracy_threshold_m: f64,

    /// EMA weight of the newest speed reading
    pub smoothing_alpha: f64,

    /// Ask the sensor for its high-accuracy mode
    pub high_accuracy: bool,

    /// Oldest cached fix the sensor may hand back (0 = always fresh)
    pub maximum_age_ms: u64,

    /// Per-request sensor timeout
    pub timeout_ms: u64,

    /// Capacity of the sensor → pipeline channel
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold_m: 20.0,
            smoothing_alpha: 0.3,
            high_accuracy: true,
            maximum_age_ms: 0,
            timeout_ms: 10_000,
            channel_capacity: 64,
        }
    }
}

impl PipelineConfig {
    /// Sensor subscription options derived from this config
    pub fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions {
            high_accuracy: self.high_accuracy,
            maximum_age: Duration::from_millis(self.maximum_age_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("accuracy_threshold_m", self.accuracy_threshold_m)?;
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::AlphaOutOfRange(self.smoothing_alpha));
        }
        positive("channel_capacity", self.channel_capacity as f64)
    }
}

/// Vehicle parameters used for fuel accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Average fuel economy in km per litre
    pub vehicle_average_km_per_litre: f64,

    /// Tank capacity in litres
    pub tank_size_litres: f64,

    /// Fuel assumed in the tank before any refill has been logged
    pub initial_fuel_litres: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            vehicle_average_km_per_litre: 44.0,
            tank_size_litres: 12.0,
            initial_fuel_litres: 10.0,
        }
    }
}

impl VehicleConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive(
            "vehicle_average_km_per_litre",
            self.vehicle_average_km_per_litre,
        )?;
        positive("tank_size_litres", self.tank_size_litres)?;
        if !(self.initial_fuel_litres >= 0.0) {
            return Err(ConfigError::NotPositive {
                field: "initial_fuel_litres",
                value: self.initial_fuel_litres,
            });
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sampling pipeline parameters
    pub pipeline: PipelineConfig,

    /// Vehicle defaults
    pub vehicle: VehicleConfig,

    /// Record store directory (defaults to the platform data dir)
    pub store_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from `path`, or defaults when the file is absent
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) if p.exists() => {
                let content = fs::read_to_string(p)?;
                serde_json::from_str::<AppConfig>(&content)?
            }
            Some(p) => {
                tracing::debug!(path = %p.display(), "config file not found, using defaults");
                AppConfig::default()
            }
            None => AppConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check that all numeric parameters are in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.vehicle.validate()
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}
