//! Display formatting for trip figures

/// Format a duration as zero-padded `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Format a distance in meters as kilometres with two decimals
pub fn format_distance_km(meters: f64) -> String {
    format!("{:.2}", meters / 1000.0)
}

/// Format a speed for the speedometer readout (whole km/h)
pub fn format_speed_kmh(kmh: f64) -> String {
    format!("{:.0}", kmh.max(0.0))
}
