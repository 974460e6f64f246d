//! User input forms
//!
//! Forms hold raw text as typed and validate it into typed values. A form that
//! fails validation has no side effects.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::NewRefill;

/// Invalid user input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field}: '{input}' is not a number")]
    NotANumber { field: &'static str, input: String },

    #[error("{field}: must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

/// Parse a finite number
fn parse_number(field: &'static str, input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    let not_a_number = || ValidationError::NotANumber {
        field,
        input: trimmed.to_string(),
    };
    let value: f64 = trimmed.parse().map_err(|_| not_a_number())?;
    if !value.is_finite() {
        return Err(not_a_number());
    }
    Ok(value)
}

/// Parse a strictly positive, finite number
fn parse_positive(field: &'static str, input: &str) -> Result<f64, ValidationError> {
    let value = parse_number(field, input)?;
    if value <= 0.0 {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(value)
}

/// Refill entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefillForm {
    /// Litres put in the tank
    pub litres: String,
    /// Total amount paid
    pub total_cost: String,
    /// The tank was filled to the brim
    pub full_tank: bool,
}

/// A refill that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRefill {
    /// Record to persist
    pub refill: NewRefill,
    /// The tank was filled to the brim
    pub full_tank: bool,
}

impl RefillForm {
    /// Create a form from raw input
    pub fn new(litres: impl Into<String>, total_cost: impl Into<String>, full_tank: bool) -> Self {
        Self {
            litres: litres.into(),
            total_cost: total_cost.into(),
            full_tank,
        }
    }

    /// Validate, stamping the refill with `date`
    pub fn validate(&self, date: DateTime<Utc>) -> Result<ValidRefill, ValidationError> {
        let litres_added = parse_positive("litres", &self.litres)?;
        let total_cost = parse_positive("total_cost", &self.total_cost)?;
        Ok(ValidRefill {
            refill: NewRefill {
                date,
                litres_added,
                total_cost,
            },
            full_tank: self.full_tank,
        })
    }
}

/// Vehicle settings entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsForm {
    /// Fuel economy in km/L
    pub vehicle_average: String,
    /// Tank capacity in litres
    pub tank_size: String,
}

/// Settings that passed validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidSettings {
    /// Fuel economy in km/L
    pub vehicle_average_km_per_litre: f64,
    /// Tank capacity in litres
    pub tank_size_litres: f64,
}

impl SettingsForm {
    /// Create a form from raw input
    pub fn new(vehicle_average: impl Into<String>, tank_size: impl Into<String>) -> Self {
        Self {
            vehicle_average: vehicle_average.into(),
            tank_size: tank_size.into(),
        }
    }

    /// Pre-fill the form from current values
    pub fn from_values(km_per_litre: f64, tank_size_litres: f64) -> Self {
        Self::new(km_per_litre.to_string(), tank_size_litres.to_string())
    }

    /// Validate both fields
    pub fn validate(&self) -> Result<ValidSettings, ValidationError> {
        Ok(ValidSettings {
            vehicle_average_km_per_litre: parse_positive("vehicle_average", &self.vehicle_average)?,
            tank_size_litres: parse_positive("tank_size", &self.tank_size)?,
        })
    }
}

/// Converts a money amount into litres at a given pump price
pub struct PetrolCalculator;

impl PetrolCalculator {
    /// `amount / price_per_litre`, or `None` unless both parse and the
    /// price is positive
    pub fn litres_for(amount: &str, price_per_litre: &str) -> Option<f64> {
        let amount = parse_number("amount", amount).ok()?;
        let price = parse_positive("price_per_litre", price_per_litre).ok()?;
        Some(amount / price)
    }
}
