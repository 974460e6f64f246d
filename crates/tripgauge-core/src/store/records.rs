//! Persisted record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::{format_distance_km, format_duration};

/// Setting key for the vehicle's fuel economy
pub const SETTING_VEHICLE_AVERAGE: &str = "vehicleAverageKmL";
/// Setting key for the tank capacity
pub const SETTING_TANK_SIZE: &str = "tankSize";
/// Setting key for the last known fuel level
pub const SETTING_REMAINING_FUEL: &str = "remainingFuel";

/// A completed trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Store-assigned identifier
    pub id: u64,
    /// When the trip was stopped
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    /// Distance covered
    pub total_distance_meters: f64,
    /// Wall-clock duration
    pub duration_seconds: u64,
    /// Mean of the smoothed speed readings
    pub avg_speed_kmh: f64,
    /// Highest smoothed speed reading
    pub max_speed_kmh: f64,
    /// Fuel burned
    pub fuel_consumed_litres: f64,
}

/// A trip about to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    /// When the trip was stopped
    pub date: DateTime<Utc>,
    /// Distance covered
    pub total_distance_meters: f64,
    /// Wall-clock duration
    pub duration_seconds: u64,
    /// Mean speed
    pub avg_speed_kmh: f64,
    /// Peak speed
    pub max_speed_kmh: f64,
    /// Fuel burned
    pub fuel_consumed_litres: f64,
}

impl NewTrip {
    pub(crate) fn with_id(self, id: u64) -> Trip {
        Trip {
            id,
            date: self.date,
            total_distance_meters: self.total_distance_meters,
            duration_seconds: self.duration_seconds,
            avg_speed_kmh: self.avg_speed_kmh,
            max_speed_kmh: self.max_speed_kmh,
            fuel_consumed_litres: self.fuel_consumed_litres,
        }
    }
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trip {} | {} km | {} | avg {:.1} km/h | max {:.1} km/h | {:.2} L",
            self.date.format("%Y-%m-%d %H:%M"),
            format_distance_km(self.total_distance_meters),
            format_duration(self.duration_seconds),
            self.avg_speed_kmh,
            self.max_speed_kmh,
            self.fuel_consumed_litres
        )
    }
}

/// A logged fuel refill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refill {
    /// Store-assigned identifier
    pub id: u64,
    /// When the refill was logged
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    /// Litres put in the tank
    pub litres_added: f64,
    /// Amount paid
    pub total_cost: f64,
    /// `total_cost / litres_added`
    pub price_per_litre: f64,
}

/// A refill about to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewRefill {
    /// When the refill was logged
    pub date: DateTime<Utc>,
    /// Litres put in the tank (> 0)
    pub litres_added: f64,
    /// Amount paid (> 0)
    pub total_cost: f64,
}

impl NewRefill {
    /// Price per litre derived from the totals
    pub fn price_per_litre(&self) -> f64 {
        self.total_cost / self.litres_added
    }

    pub(crate) fn with_id(self, id: u64) -> Refill {
        Refill {
            id,
            date: self.date,
            litres_added: self.litres_added,
            total_cost: self.total_cost,
            price_per_litre: self.price_per_litre(),
        }
    }
}

impl fmt::Display for Refill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Refill {} | {:.2} L | cost {:.2} | {:.2}/L",
            self.date.format("%Y-%m-%d %H:%M"),
            self.litres_added,
            self.total_cost,
            self.price_per_litre
        )
    }
}

/// A settings value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean flag
    Bool(bool),
    /// Whole number
    Integer(i64),
    /// Decimal number
    Float(f64),
    /// Free text
    String(String),
}

impl SettingValue {
    /// Numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Integer(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_value_json_shapes() {
        let values = vec![
            SettingValue::Float(12.5),
            SettingValue::Integer(12),
            SettingValue::Bool(true),
            SettingValue::String("petrol".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[12.5,12,true,"petrol"]"#);
        let back: Vec<SettingValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_whole_float_stays_float() {
        let json = serde_json::to_string(&SettingValue::Float(12.0)).unwrap();
        let back: SettingValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SettingValue::Float(12.0));
        assert_eq!(back.as_f64(), Some(12.0));
    }

    #[test]
    fn test_trip_json_field_names() {
        let trip = NewTrip {
            date: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            total_distance_meters: 1000.0,
            duration_seconds: 60,
            avg_speed_kmh: 60.0,
            max_speed_kmh: 72.0,
            fuel_consumed_litres: 0.025,
        }
        .with_id(1);
        let json = serde_json::to_value(&trip).unwrap();
        assert_eq!(json["date"], 1_700_000_000_000_i64);
        assert_eq!(json["totalDistanceMeters"], 1000.0);
        assert_eq!(json["fuelConsumedLitres"], 0.025);
    }

    #[test]
    fn test_refill_price() {
        let refill = NewRefill {
            date: Utc::now(),
            litres_added: 10.0,
            total_cost: 1000.0,
        }
        .with_id(7);
        assert_eq!(refill.price_per_litre, 100.0);
        assert_eq!(refill.id, 7);
    }
}
