//! Trip, refill and settings operations
//!
//! [`TripController`] is the write path for everything that is not the
//! sampling pipeline: trip boundaries, refill logging, settings and the bulk
//! data reset. It owns the [`RecordStore`] and shares [`SharedState`] with the
//! pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::VehicleConfig;
use crate::error::Result;
use crate::forms::{RefillForm, SettingsForm};
use crate::state::SharedState;
use crate::store::{
    NewTrip, RecordStore, Refill, Trip, SETTING_REMAINING_FUEL, SETTING_TANK_SIZE,
    SETTING_VEHICLE_AVERAGE,
};
use crate::unit_conversion::range_km;

/// Fuel gauge readout
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FuelStatus {
    /// Fuel left in the tank
    pub remaining_litres: f64,
    /// Tank capacity
    pub tank_size_litres: f64,
    /// Fill level, 0 to 100
    pub percentage: f64,
    /// Distance the remaining fuel should cover
    pub range_km: f64,
}

/// Stored history, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    /// Completed trips
    pub trips: Vec<Trip>,
    /// Logged refills
    pub refills: Vec<Refill>,
}

/// Coordinates shared state and the record store
#[derive(Debug)]
pub struct TripController {
    state: SharedState,
    store: RecordStore,
    defaults: VehicleConfig,
}

impl TripController {
    /// Create a controller. `defaults` is what [`delete_all_data`] restores.
    ///
    /// [`delete_all_data`]: TripController::delete_all_data
    pub fn new(state: SharedState, store: RecordStore, defaults: VehicleConfig) -> Self {
        Self {
            state,
            store,
            defaults,
        }
    }

    /// Shared state handle
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Underlying record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Restore vehicle settings and the fuel level saved by earlier sessions.
    /// Missing or non-positive values keep the current state.
    pub fn load_settings(&mut self) {
        let snap = self.state.snapshot();
        let km_per_litre = self
            .store
            .get_f64(SETTING_VEHICLE_AVERAGE)
            .filter(|v| *v > 0.0)
            .unwrap_or(snap.vehicle_average_km_per_litre);
        let tank = self
            .store
            .get_f64(SETTING_TANK_SIZE)
            .filter(|v| *v > 0.0)
            .unwrap_or(snap.tank_size_litres);
        self.state.set_vehicle_config(km_per_litre, tank);

        if let Some(fuel) = self.store.get_f64(SETTING_REMAINING_FUEL) {
            self.state.set_remaining_fuel(fuel);
        }

        tracing::info!(
            km_per_litre,
            tank_size_litres = tank,
            remaining_fuel_litres = self.state.remaining_fuel_litres(),
            "settings loaded"
        );
    }

    /// Start a new trip now
    pub fn start_trip(&mut self) {
        self.start_trip_at(Utc::now());
    }

    /// Start a new trip at `now`. Any previous accumulation is discarded.
    pub fn start_trip_at(&mut self, now: DateTime<Utc>) {
        self.state.reset_trip();
        self.state.start_trip(now);
        tracing::info!(started_at = %now, "trip started");
    }

    /// Stop the active trip now and persist it
    pub fn stop_trip(&mut self) -> Result<Option<Trip>> {
        self.stop_trip_at(Utc::now())
    }

    /// Stop the active trip at `now` and persist it. Returns `None` without
    /// touching the store when no trip is active.
    ///
    /// The trip stays active until it has been written, so a failed write
    /// can be retried.
    pub fn stop_trip_at(&mut self, now: DateTime<Utc>) -> Result<Option<Trip>> {
        let snap = self.state.snapshot();
        if !snap.trip_active {
            tracing::debug!("stop requested with no active trip");
            return Ok(None);
        }

        let duration_seconds = snap
            .trip_started_at
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        let new_trip = NewTrip {
            date: now,
            total_distance_meters: snap.distance_meters,
            duration_seconds,
            avg_speed_kmh: snap.trip_stats.average_speed_kmh(),
            max_speed_kmh: snap.trip_stats.max_speed_kmh,
            fuel_consumed_litres: snap.trip_stats.fuel_consumed_litres,
        };

        let trip = self.store.add_trip(new_trip)?;
        self.state.stop_trip();
        self.state.reset_trip();

        tracing::info!(
            id = trip.id,
            distance_m = trip.total_distance_meters,
            duration_s = trip.duration_seconds,
            fuel_l = trip.fuel_consumed_litres,
            "trip saved"
        );
        Ok(Some(trip))
    }

    /// Validate and record a refill, then update the fuel level
    pub fn log_refill(&mut self, form: &RefillForm) -> Result<Refill> {
        let valid = form.validate(Utc::now()).inspect_err(|err| {
            tracing::warn!(%err, "refill rejected");
        })?;

        let refill = self.store.add_refill(valid.refill)?;
        if valid.full_tank {
            self.state.fill_tank();
        } else {
            self.state.add_fuel_litres(refill.litres_added);
        }

        let remaining = self.state.remaining_fuel_litres();
        self.store.put_setting(SETTING_REMAINING_FUEL, remaining)?;

        tracing::info!(
            id = refill.id,
            litres = refill.litres_added,
            price_per_litre = refill.price_per_litre,
            full_tank = valid.full_tank,
            remaining_fuel_litres = remaining,
            "refill logged"
        );
        Ok(refill)
    }

    /// Validate and apply vehicle settings
    pub fn save_settings(&mut self, form: &SettingsForm) -> Result<()> {
        let valid = form.validate().inspect_err(|err| {
            tracing::warn!(%err, "settings rejected");
        })?;

        self.store
            .put_setting(SETTING_VEHICLE_AVERAGE, valid.vehicle_average_km_per_litre)?;
        self.store
            .put_setting(SETTING_TANK_SIZE, valid.tank_size_litres)?;
        self.state
            .set_vehicle_config(valid.vehicle_average_km_per_litre, valid.tank_size_litres);

        tracing::info!(
            km_per_litre = valid.vehicle_average_km_per_litre,
            tank_size_litres = valid.tank_size_litres,
            "settings saved"
        );
        Ok(())
    }

    /// Erase all trips, refills and settings and return to the defaults.
    /// A trip in progress is discarded.
    pub fn delete_all_data(&mut self) -> Result<()> {
        self.store.clear_all()?;

        self.state.stop_trip();
        self.state.reset_trip();
        self.state.set_vehicle_config(
            self.defaults.vehicle_average_km_per_litre,
            self.defaults.tank_size_litres,
        );
        self.state
            .set_remaining_fuel(self.defaults.initial_fuel_litres);

        tracing::info!("all data deleted");
        Ok(())
    }

    /// Current fuel gauge readout
    pub fn fuel_status(&self) -> FuelStatus {
        let snap = self.state.snapshot();
        let percentage = if snap.tank_size_litres > 0.0 {
            snap.remaining_fuel_litres / snap.tank_size_litres * 100.0
        } else {
            0.0
        };
        FuelStatus {
            remaining_litres: snap.remaining_fuel_litres,
            tank_size_litres: snap.tank_size_litres,
            percentage,
            range_km: range_km(
                snap.remaining_fuel_litres,
                snap.vehicle_average_km_per_litre,
            ),
        }
    }

    /// Stored trips and refills, newest first
    pub fn history(&self) -> History {
        History {
            trips: self.store.list_trips(),
            refills: self.store.list_refills(),
        }
    }
}
