//! # TripGauge Core Library
//!
//! Core functionality for the TripGauge speedometer and fuel tracker.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Great-circle distance between GPS fixes
//! - Location sensor abstraction with demo and replay sources
//! - The sampling pipeline: accuracy gating, speed smoothing, distance and
//!   fuel accumulation
//! - Shared application state with a fixed command set
//! - A persisted store for trips, refills and settings
//! - Trip, refill and settings operations with input validation
//!
//! ## Example
//!
//! ```rust,ignore
//! use tripgauge_core::prelude::*;
//!
//! let config = AppConfig::load(None)?;
//! let state = SharedState::new(config.vehicle.clone());
//! let store = RecordStore::open(config.store_path.as_deref())?;
//!
//! let sensor = DemoSensor::new(DemoRoute::default());
//! let pipeline = SamplingPipeline::activate(sensor, state.clone(), config.pipeline.clone());
//!
//! let mut controller = TripController::new(state, store, config.vehicle);
//! controller.start_trip();
//! // ... drive ...
//! let trip = controller.stop_trip()?;
//! pipeline.deactivate().await;
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod forms;
pub mod geo;
pub mod pipeline;
pub mod sensor;
pub mod state;
pub mod store;
pub mod unit_conversion;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AppConfig, PipelineConfig, VehicleConfig};
    pub use crate::controller::{FuelStatus, TripController};
    pub use crate::forms::{PetrolCalculator, RefillForm, SettingsForm};
    pub use crate::geo::{haversine_distance, GeoPoint};
    pub use crate::pipeline::{PipelineHandle, SampleOutcome, SamplingPipeline};
    pub use crate::sensor::{
        DemoRoute, DemoSensor, LocationSample, LocationSensor, ReplaySensor, SensorError,
        SensorEvent, SubscribeOptions, UnavailableSensor,
    };
    pub use crate::state::{GpsStatus, SharedState, StateSnapshot};
    pub use crate::store::{RecordStore, Refill, SettingValue, Trip};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
