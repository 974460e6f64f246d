//! Unit Conversion Functions
//!
//! Conversions used by the speedometer and fuel accounting:
//! - Speed: m/s → km/h
//! - Distance: meters → kilometers
//! - Fuel: distance ↔ litres at a given km/L economy

/// Convert meters per second to km/h
pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * 3.6
}

/// Convert meters to kilometers
pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

/// Litres burned covering `meters` at `km_per_litre`
pub fn fuel_for_distance(meters: f64, km_per_litre: f64) -> f64 {
    meters_to_km(meters) / km_per_litre
}

/// Kilometres `litres` of fuel will cover at `km_per_litre`
pub fn range_km(litres: f64, km_per_litre: f64) -> f64 {
    litres * km_per_litre
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mps_kmh_conversion() {
        assert!((mps_to_kmh(10.0) - 36.0).abs() < 1e-9);
        assert_eq!(mps_to_kmh(0.0), 0.0);
    }

    #[test]
    fn test_fuel_and_range_are_inverse() {
        let litres = fuel_for_distance(22_000.0, 44.0);
        assert!((litres - 0.5).abs() < 1e-12);
        assert!((range_km(litres, 44.0) - 22.0).abs() < 1e-9);
    }
}
