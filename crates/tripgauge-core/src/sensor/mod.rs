//! Location Sensor
//!
//! Abstraction over a device location sensor. A subscribed sensor pushes
//! [`SensorEvent`]s into a channel; the sampling pipeline is the single
//! consumer of that channel.

mod demo;
mod replay;

pub use demo::{DemoDrive, DemoRoute, DemoSensor};
pub use replay::{write_track_csv, ReplaySensor, TrackLogError, TRACK_LOG_HEADER};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::geo::GeoPoint;

/// A single fix delivered by the location sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Instantaneous ground speed in m/s, when the sensor reports one
    pub speed_mps: Option<f64>,
    /// Horizontal accuracy radius in meters (smaller is better)
    pub accuracy_m: f64,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// Create a sample stamped with the current time
    pub fn new(latitude: f64, longitude: f64, speed_mps: Option<f64>, accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed_mps,
            accuracy_m,
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Position of this fix
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Errors reported by the location sensor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Timed out waiting for a position")]
    Timeout,

    #[error("Device has no location capability")]
    Unavailable,
}

impl SensorError {
    /// Whether this is the permission-denied class of error
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SensorError::PermissionDenied)
    }
}

/// Event pushed by a subscribed sensor
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// A new fix
    Sample(LocationSample),
    /// The sensor failed to produce a fix
    Error(SensorError),
}

/// Options requested when subscribing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Request the sensor's high-accuracy mode
    pub high_accuracy: bool,
    /// Oldest cached fix acceptable (zero = fresh fixes only)
    pub maximum_age: Duration,
    /// How long to wait for each fix before reporting a timeout
    pub timeout: Duration,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::ZERO,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Handle identifying an active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A source of continuous location updates
pub trait LocationSensor: Send {
    /// Whether the device has any location capability at all
    fn is_available(&self) -> bool {
        true
    }

    /// Start delivering events into `events` until unsubscribed.
    ///
    /// Must be called from within a tokio runtime.
    fn subscribe(
        &mut self,
        options: SubscribeOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionId, SensorError>;

    /// Stop a subscription. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId);
}

impl<S: LocationSensor + ?Sized> LocationSensor for Box<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn subscribe(
        &mut self,
        options: SubscribeOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionId, SensorError> {
        (**self).subscribe(options, events)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }
}

/// A sensor for devices without location hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSensor;

impl LocationSensor for UnavailableSensor {
    fn is_available(&self) -> bool {
        false
    }

    fn subscribe(
        &mut self,
        _options: SubscribeOptions,
        _events: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionId, SensorError> {
        Err(SensorError::Unavailable)
    }

    fn unsubscribe(&mut self, _id: SubscriptionId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_classification() {
        assert!(SensorError::PermissionDenied.is_permission_denied());
        assert!(!SensorError::Timeout.is_permission_denied());
        assert!(!SensorError::PositionUnavailable("no fix".into()).is_permission_denied());
    }

    #[test]
    fn test_unavailable_sensor_refuses() {
        let (tx, _rx) = mpsc::channel(1);
        let mut sensor = UnavailableSensor;
        assert!(!sensor.is_available());
        assert_eq!(
            sensor.subscribe(SubscribeOptions::default(), tx),
            Err(SensorError::Unavailable)
        );
    }
}
