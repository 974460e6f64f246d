//! Plain-text renderings of the speedometer, fuel gauge and history

use std::fmt::Write;

use tripgauge_core::controller::{FuelStatus, History};
use tripgauge_core::format::{format_distance_km, format_duration, format_speed_kmh};
use tripgauge_core::state::StateSnapshot;

/// One-line speedometer readout
pub fn speedometer(snap: &StateSnapshot, now: chrono::DateTime<chrono::Utc>) -> String {
    let elapsed = snap
        .trip_started_at
        .filter(|_| snap.trip_active)
        .map(|start| (now - start).num_seconds().max(0) as u64)
        .unwrap_or(0);
    format!(
        "{:>4} km/h | {} km | {} | fuel {:.2} L | {}",
        format_speed_kmh(snap.speed_kmh),
        format_distance_km(snap.distance_meters),
        format_duration(elapsed),
        snap.remaining_fuel_litres,
        snap.gps_status.describe(snap.gps_accuracy)
    )
}

/// Fuel gauge block
pub fn fuel(status: &FuelStatus) -> String {
    format!(
        "Fuel: {:.2} / {:.1} L ({:.0}%), range ~{:.0} km",
        status.remaining_litres, status.tank_size_litres, status.percentage, status.range_km
    )
}

/// Trip and refill history
pub fn history(history: &History) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Trips ({})", history.trips.len());
    if history.trips.is_empty() {
        let _ = writeln!(out, "  no trips recorded yet");
    }
    for trip in &history.trips {
        let _ = writeln!(out, "  #{} {}", trip.id, trip);
    }
    let _ = writeln!(out, "Refills ({})", history.refills.len());
    if history.refills.is_empty() {
        let _ = writeln!(out, "  no refills logged yet");
    }
    for refill in &history.refills {
        let _ = writeln!(out, "  #{} {}", refill.id, refill);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tripgauge_core::state::{GpsStatus, SharedState};

    #[test]
    fn test_speedometer_shows_elapsed_trip_time() {
        let state = SharedState::default();
        let now = Utc::now();
        state.start_trip(now - Duration::seconds(75));
        state.set_speed_kmh(42.4);
        state.add_distance_meters(1500.0);
        state.set_gps_status(GpsStatus::Ready);
        state.set_gps_accuracy(6.0);

        let line = speedometer(&state.snapshot(), now);
        assert_eq!(
            line,
            "  42 km/h | 1.50 km | 00:01:15 | fuel 10.00 L | GPS Ready (Accuracy: 6m)"
        );
    }

    #[test]
    fn test_empty_history_says_so() {
        let text = history(&History::default());
        assert!(text.contains("no trips recorded yet"));
        assert!(text.contains("no refills logged yet"));
    }
}
