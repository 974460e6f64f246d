//! Shared application state
//!
//! Holds the live speedometer readings, trip accumulators, GPS status and fuel
//! level. All mutation goes through the command methods on [`SharedState`];
//! readers take a [`StateSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::VehicleConfig;

/// GPS signal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GpsStatus {
    /// No fix or error received yet
    Initializing,
    /// Receiving fixes, but too imprecise to use
    Acquiring,
    /// Receiving usable fixes
    Ready,
    /// Sensor failed or is missing
    Error,
    /// Location permission was refused
    Denied,
}

impl GpsStatus {
    /// Human-readable status line
    pub fn describe(&self, accuracy_m: Option<f64>) -> String {
        let accuracy = accuracy_m
            .map(|a| format!("{:.0}m", a))
            .unwrap_or_else(|| "-".to_string());
        match self {
            GpsStatus::Initializing => "Initializing GPS...".to_string(),
            GpsStatus::Acquiring => format!("Acquiring Signal... (Accuracy: {})", accuracy),
            GpsStatus::Ready => format!("GPS Ready (Accuracy: {})", accuracy),
            GpsStatus::Error => "GPS Error".to_string(),
            GpsStatus::Denied => "GPS Permission Denied".to_string(),
        }
    }
}

impl fmt::Display for GpsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GpsStatus::Initializing => "INITIALIZING",
            GpsStatus::Acquiring => "ACQUIRING",
            GpsStatus::Ready => "READY",
            GpsStatus::Error => "ERROR",
            GpsStatus::Denied => "DENIED",
        };
        f.write_str(s)
    }
}

/// Running statistics for the active trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripStats {
    /// Smoothed speed readings seen while the trip was active
    pub speed_samples: u64,
    /// Sum of those readings, for the mean
    pub speed_sum_kmh: f64,
    /// Highest reading
    pub max_speed_kmh: f64,
    /// Fuel consumed by distance increments during the trip
    pub fuel_consumed_litres: f64,
}

impl TripStats {
    fn record_speed(&mut self, kmh: f64) {
        self.speed_samples += 1;
        self.speed_sum_kmh += kmh;
        if kmh > self.max_speed_kmh {
            self.max_speed_kmh = kmh;
        }
    }

    /// Mean of all recorded speed readings, 0 when there were none
    pub fn average_speed_kmh(&self) -> f64 {
        if self.speed_samples == 0 {
            0.0
        } else {
            self.speed_sum_kmh / self.speed_samples as f64
        }
    }
}

/// Totals of a trip at the moment it was stopped
#[derive(Debug, Clone, PartialEq)]
pub struct TripTotals {
    /// When the trip started
    pub started_at: Option<DateTime<Utc>>,
    /// Accumulated distance
    pub distance_meters: f64,
    /// Speed and fuel statistics
    pub stats: TripStats,
}

/// Full application state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Smoothed current speed
    pub speed_kmh: f64,
    /// Distance accumulated in the current trip
    pub distance_meters: f64,
    /// Wall-clock start of the current trip
    pub trip_started_at: Option<DateTime<Utc>>,
    /// Whether a trip is being recorded
    pub trip_active: bool,
    /// GPS signal status
    pub gps_status: GpsStatus,
    /// Accuracy of the latest fix in meters
    pub gps_accuracy: Option<f64>,
    /// Fuel left in the tank, always within `[0, tank_size_litres]`
    pub remaining_fuel_litres: f64,
    /// Vehicle fuel economy
    pub vehicle_average_km_per_litre: f64,
    /// Tank capacity
    pub tank_size_litres: f64,
    /// Current trip statistics
    pub trip_stats: TripStats,
}

/// Read-only copy of the state handed to consumers
pub type StateSnapshot = AppState;

impl AppState {
    /// Initial state for the given vehicle
    pub fn new(vehicle: &VehicleConfig) -> Self {
        Self {
            speed_kmh: 0.0,
            distance_meters: 0.0,
            trip_started_at: None,
            trip_active: false,
            gps_status: GpsStatus::Initializing,
            gps_accuracy: None,
            remaining_fuel_litres: vehicle
                .initial_fuel_litres
                .clamp(0.0, vehicle.tank_size_litres),
            vehicle_average_km_per_litre: vehicle.vehicle_average_km_per_litre,
            tank_size_litres: vehicle.tank_size_litres,
            trip_stats: TripStats::default(),
        }
    }

    fn clamp_fuel(&mut self) {
        self.remaining_fuel_litres = self.remaining_fuel_litres.clamp(0.0, self.tank_size_litres);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&VehicleConfig::default())
    }
}

/// Cloneable handle to the shared application state
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<AppState>>,
}

impl SharedState {
    /// Create state for the given vehicle
    pub fn new(vehicle: VehicleConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppState::new(&vehicle))),
        }
    }

    // The state is plain data, so a panic mid-update cannot leave it unusable.
    fn read(&self) -> RwLockReadGuard<'_, AppState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the whole state
    pub fn snapshot(&self) -> StateSnapshot {
        self.read().clone()
    }

    /// Current GPS status
    pub fn gps_status(&self) -> GpsStatus {
        self.read().gps_status
    }

    /// Whether a trip is being recorded
    pub fn trip_active(&self) -> bool {
        self.read().trip_active
    }

    /// Vehicle fuel economy in km/L
    pub fn vehicle_average_km_per_litre(&self) -> f64 {
        self.read().vehicle_average_km_per_litre
    }

    /// Fuel left in the tank
    pub fn remaining_fuel_litres(&self) -> f64 {
        self.read().remaining_fuel_litres
    }

    /// Publish the smoothed speed. Readings during an active trip feed the
    /// trip's average and maximum.
    pub fn set_speed_kmh(&self, kmh: f64) {
        let mut state = self.write();
        state.speed_kmh = kmh;
        if state.trip_active {
            state.trip_stats.record_speed(kmh);
        }
    }

    /// Add a distance increment to the current trip
    pub fn add_distance_meters(&self, meters: f64) {
        self.write().distance_meters += meters;
    }

    /// Set the GPS status, returning whether it changed
    pub fn set_gps_status(&self, status: GpsStatus) -> bool {
        let mut state = self.write();
        if state.gps_status == status {
            return false;
        }
        tracing::debug!(from = %state.gps_status, to = %status, "gps status");
        state.gps_status = status;
        true
    }

    /// Publish the accuracy of the latest fix
    pub fn set_gps_accuracy(&self, accuracy_m: f64) {
        self.write().gps_accuracy = Some(accuracy_m);
    }

    /// Burn fuel. The tank never goes below empty; the trip records the full
    /// amount consumed.
    pub fn consume_fuel_litres(&self, litres: f64) {
        let mut state = self.write();
        state.remaining_fuel_litres -= litres;
        state.clamp_fuel();
        if state.trip_active {
            state.trip_stats.fuel_consumed_litres += litres;
        }
    }

    /// Add fuel, capped at the tank size
    pub fn add_fuel_litres(&self, litres: f64) {
        let mut state = self.write();
        state.remaining_fuel_litres += litres;
        state.clamp_fuel();
    }

    /// Set the fuel level directly, clamped to the tank
    pub fn set_remaining_fuel(&self, litres: f64) {
        let mut state = self.write();
        state.remaining_fuel_litres = litres;
        state.clamp_fuel();
    }

    /// Fill the tank to capacity, returning the new level
    pub fn fill_tank(&self) -> f64 {
        let mut state = self.write();
        state.remaining_fuel_litres = state.tank_size_litres;
        state.remaining_fuel_litres
    }

    /// Update fuel economy
    pub fn set_vehicle_average(&self, km_per_litre: f64) {
        self.write().vehicle_average_km_per_litre = km_per_litre;
    }

    /// Update tank size; the fuel level is clamped to the new capacity
    pub fn set_tank_size(&self, litres: f64) {
        let mut state = self.write();
        state.tank_size_litres = litres;
        state.clamp_fuel();
    }

    /// Replace fuel economy and tank size together; fuel is clamped to the
    /// new capacity
    pub fn set_vehicle_config(&self, km_per_litre: f64, tank_size_litres: f64) {
        let mut state = self.write();
        state.vehicle_average_km_per_litre = km_per_litre;
        state.tank_size_litres = tank_size_litres;
        state.clamp_fuel();
    }

    /// Mark a trip active from `now`
    pub fn start_trip(&self, now: DateTime<Utc>) {
        let mut state = self.write();
        state.trip_active = true;
        state.trip_started_at = Some(now);
    }

    /// Mark the trip inactive, returning its totals if one was running
    pub fn stop_trip(&self) -> Option<TripTotals> {
        let mut state = self.write();
        if !state.trip_active {
            return None;
        }
        state.trip_active = false;
        Some(TripTotals {
            started_at: state.trip_started_at,
            distance_meters: state.distance_meters,
            stats: state.trip_stats.clone(),
        })
    }

    /// Clear trip accumulators: distance, start time, speed and statistics
    pub fn reset_trip(&self) {
        let mut state = self.write();
        state.distance_meters = 0.0;
        state.trip_started_at = None;
        state.speed_kmh = 0.0;
        state.trip_stats = TripStats::default();
    }
}
