//! Record Store
//!
//! Local persisted storage for trips, refills and settings.
//!
//! ## Layout
//!
//! ```text
//! [store dir]/
//! ├── trips.json      # append-only trip records
//! ├── refills.json    # append-only refill records
//! └── settings.json   # key → value
//! ```
//!
//! Trip and refill ids are assigned by the store, increase monotonically and
//! are never reused, even after [`RecordStore::clear_all`].

mod records;

pub use records::{
    NewRefill, NewTrip, Refill, SettingValue, Trip, SETTING_REMAINING_FUEL, SETTING_TANK_SIZE,
    SETTING_VEHICLE_AVERAGE,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TRIPS_FILE: &str = "trips.json";
const REFILLS_FILE: &str = "refills.json";
const SETTINGS_FILE: &str = "settings.json";

/// Errors reading or writing the record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt store file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not find a data directory for the store")]
    NoDataDir,
}

/// An append-only collection with its id counter
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collection<T> {
    next_id: u64,
    records: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}

/// File-backed store for trips, refills and settings
#[derive(Debug)]
pub struct RecordStore {
    /// Store directory path
    pub path: PathBuf,
    trips: Collection<Trip>,
    refills: Collection<Refill>,
    settings: BTreeMap<String, SettingValue>,
}

impl RecordStore {
    /// Get the default store directory (in app data)
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or(StoreError::NoDataDir)?;
        Ok(base.join("TripGauge"))
    }

    /// Open or create the store
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let store_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        fs::create_dir_all(&store_path)?;

        let store = RecordStore {
            trips: load_json(&store_path.join(TRIPS_FILE))?,
            refills: load_json(&store_path.join(REFILLS_FILE))?,
            settings: load_json(&store_path.join(SETTINGS_FILE))?,
            path: store_path,
        };

        tracing::debug!(
            path = %store.path.display(),
            trips = store.trips.records.len(),
            refills = store.refills.records.len(),
            "record store opened"
        );

        Ok(store)
    }

    /// Append a trip and return it with its assigned id
    pub fn add_trip(&mut self, trip: NewTrip) -> Result<Trip, StoreError> {
        let mut trips = self.trips.clone();
        let trip = trip.with_id(trips.allocate_id());
        trips.records.push(trip.clone());
        save_json(&self.path.join(TRIPS_FILE), &trips)?;
        self.trips = trips;
        Ok(trip)
    }

    /// Append a refill and return it with its assigned id
    pub fn add_refill(&mut self, refill: NewRefill) -> Result<Refill, StoreError> {
        let mut refills = self.refills.clone();
        let refill = refill.with_id(refills.allocate_id());
        refills.records.push(refill.clone());
        save_json(&self.path.join(REFILLS_FILE), &refills)?;
        self.refills = refills;
        Ok(refill)
    }

    /// All trips, newest first
    pub fn list_trips(&self) -> Vec<Trip> {
        let mut trips = self.trips.records.clone();
        trips.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        trips
    }

    /// All refills, newest first
    pub fn list_refills(&self) -> Vec<Refill> {
        let mut refills = self.refills.records.clone();
        refills.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        refills
    }

    /// Number of stored trips
    pub fn trip_count(&self) -> usize {
        self.trips.records.len()
    }

    /// Number of stored refills
    pub fn refill_count(&self) -> usize {
        self.refills.records.len()
    }

    /// Insert or replace a setting
    pub fn put_setting(
        &mut self,
        key: &str,
        value: impl Into<SettingValue>,
    ) -> Result<(), StoreError> {
        let mut settings = self.settings.clone();
        settings.insert(key.to_string(), value.into());
        save_json(&self.path.join(SETTINGS_FILE), &settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Look up a setting
    pub fn get_setting(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }

    /// Look up a numeric setting
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get_setting(key).and_then(SettingValue::as_f64)
    }

    /// Empty all three collections
    ///
    /// Each collection is cleared in memory only once its file is written,
    /// so a failed write leaves that collection intact.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        let mut trips = self.trips.clone();
        trips.clear();
        save_json(&self.path.join(TRIPS_FILE), &trips)?;
        self.trips = trips;

        let mut refills = self.refills.clone();
        refills.clear();
        save_json(&self.path.join(REFILLS_FILE), &refills)?;
        self.refills = refills;

        let settings = BTreeMap::new();
        save_json(&self.path.join(SETTINGS_FILE), &settings)?;
        self.settings = settings;

        tracing::info!(path = %self.path.display(), "record store cleared");
        Ok(())
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write via a temporary file so a crash never leaves a half-written file
fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
