//! Track log replay
//!
//! Plays back a recorded sequence of sensor events with its original timing,
//! optionally sped up. Track logs are CSV files with the columns
//! `time_s,latitude,longitude,speed_mps,accuracy_m`; an empty speed column
//! means the sensor reported no speed for that fix.

use chrono::Utc;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{LocationSample, LocationSensor, SensorError, SensorEvent, SubscribeOptions, SubscriptionId};

/// CSV header written and expected for track logs
pub const TRACK_LOG_HEADER: &str = "time_s,latitude,longitude,speed_mps,accuracy_m";

/// Longest wait between replayed events, however slow the playback
const MAX_REPLAY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors reading or writing track logs
#[derive(Error, Debug)]
pub enum TrackLogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Sensor that replays a fixed list of timed events
#[derive(Debug)]
pub struct ReplaySensor {
    /// Events with their offset from the start of the recording
    events: Vec<(Duration, SensorEvent)>,
    /// Playback speed divisor: 1.0 = real time, 0.0 = no delays
    time_scale: f64,
    next_id: u64,
    subscriptions: HashMap<SubscriptionId, (CancellationToken, JoinHandle<()>)>,
}

impl ReplaySensor {
    /// Create a replay of the given events. Offsets must be non-decreasing.
    pub fn new(events: Vec<(Duration, SensorEvent)>) -> Self {
        Self {
            events,
            time_scale: 1.0,
            next_id: 1,
            subscriptions: HashMap::new(),
        }
    }

    /// Replay samples spaced `interval` apart
    pub fn from_samples(interval: Duration, samples: Vec<LocationSample>) -> Self {
        let events = samples
            .into_iter()
            .enumerate()
            .map(|(i, s)| (interval * i as u32, SensorEvent::Sample(s)))
            .collect();
        Self::new(events)
    }

    /// Load a CSV track log
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TrackLogError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with("time_s") || line.starts_with('#') {
                continue;
            }
            let (offset, sample) = parse_track_line(line).map_err(|message| TrackLogError::Parse {
                line: idx + 1,
                message,
            })?;
            events.push((offset, SensorEvent::Sample(sample)));
        }

        tracing::debug!(events = events.len(), "loaded track log");
        Ok(Self::new(events))
    }

    /// Set the playback speed: 2.0 plays twice as fast, 0.0 without delays
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale.max(0.0);
        self
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[(Duration, SensorEvent)] {
        &self.events
    }

    /// Events as they would be delivered under `timeout`: a gap between
    /// consecutive events longer than the timeout yields a
    /// [`SensorError::Timeout`] at the point the timeout expired.
    pub fn schedule(&self, timeout: Duration) -> Vec<(Duration, SensorEvent)> {
        let mut out = Vec::with_capacity(self.events.len());
        let mut previous = Duration::ZERO;
        for (offset, event) in &self.events {
            if !timeout.is_zero() && offset.saturating_sub(previous) > timeout {
                out.push((previous + timeout, SensorEvent::Error(SensorError::Timeout)));
            }
            out.push((*offset, event.clone()));
            previous = *offset;
        }
        out
    }

    fn scaled(&self, d: Duration) -> Duration {
        if self.time_scale == 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(d.as_secs_f64() / self.time_scale)
            .map_or(MAX_REPLAY_DELAY, |scaled| scaled.min(MAX_REPLAY_DELAY))
    }
}

impl LocationSensor for ReplaySensor {
    fn subscribe(
        &mut self,
        options: SubscribeOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionId, SensorError> {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let schedule: Vec<(Duration, SensorEvent)> = self
            .schedule(options.timeout)
            .into_iter()
            .map(|(offset, event)| (self.scaled(offset), event))
            .collect();

        let token = CancellationToken::new();
        let cancel = token.clone();
        let handle = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let wall_start = Utc::now();
            for (offset, event) in schedule {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep_until(started + offset) => {}
                }
                let event = match event {
                    SensorEvent::Sample(sample) => {
                        let stamp = chrono::Duration::from_std(offset).unwrap_or_default();
                        SensorEvent::Sample(sample.at(wall_start + stamp))
                    }
                    other => other,
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            tracing::debug!("track replay finished");
        });

        self.subscriptions.insert(id, (token, handle));
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some((token, handle)) = self.subscriptions.remove(&id) {
            token.cancel();
            handle.abort();
        }
    }
}

impl Drop for ReplaySensor {
    fn drop(&mut self) {
        for (_, (token, handle)) in self.subscriptions.drain() {
            token.cancel();
            handle.abort();
        }
    }
}

fn parse_track_line(line: &str) -> Result<(Duration, LocationSample), String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 columns, found {}", fields.len()));
    }

    let number = |name: &str, value: &str| -> Result<f64, String> {
        value
            .parse::<f64>()
            .map_err(|_| format!("invalid {}: '{}'", name, value))
    };

    let time_s = number("time_s", fields[0])?;
    let offset = Duration::try_from_secs_f64(time_s)
        .map_err(|_| format!("invalid time: {}", time_s))?;
    let latitude = number("latitude", fields[1])?;
    let longitude = number("longitude", fields[2])?;
    let speed_mps = if fields[3].is_empty() {
        None
    } else {
        Some(number("speed_mps", fields[3])?)
    };
    let accuracy_m = number("accuracy_m", fields[4])?;

    Ok((
        offset,
        LocationSample::new(latitude, longitude, speed_mps, accuracy_m),
    ))
}

/// Write samples to a CSV track log, timed relative to the first sample
pub fn write_track_csv<P: AsRef<Path>>(path: P, samples: &[LocationSample]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", TRACK_LOG_HEADER)?;

    let origin = samples.first().map(|s| s.timestamp);
    for sample in samples {
        let t = origin
            .map(|o| (sample.timestamp - o).num_milliseconds() as f64 / 1000.0)
            .unwrap_or_default();
        write!(
            writer,
            "{:.3},{:.7},{:.7},",
            t, sample.latitude, sample.longitude
        )?;
        if let Some(speed) = sample.speed_mps {
            write!(writer, "{:.3}", speed)?;
        }
        writeln!(writer, ",{:.1}", sample.accuracy_m)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_and_without_speed() {
        let (t, s) = parse_track_line("1.5,12.9716,77.5946,8.2,5.0").unwrap();
        assert_eq!(t, Duration::from_millis(1500));
        assert_eq!(s.speed_mps, Some(8.2));

        let (_, s) = parse_track_line("2.0,12.9716,77.5946,,25.0").unwrap();
        assert_eq!(s.speed_mps, None);
        assert_eq!(s.accuracy_m, 25.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_track_line("1.0,abc,77.0,1.0,5.0").is_err());
        assert!(parse_track_line("1.0,12.0,77.0").is_err());
    }

    #[test]
    fn test_parse_rejects_unusable_times() {
        assert!(parse_track_line("-1.0,12.0,77.0,1.0,5.0").is_err());
        assert!(parse_track_line("inf,12.0,77.0,1.0,5.0").is_err());
        assert!(parse_track_line("NaN,12.0,77.0,1.0,5.0").is_err());
    }

    #[test]
    fn test_infinite_time_in_log_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.csv");
        std::fs::write(
            &path,
            format!("{}\n0.0,1.0,1.0,2.0,5.0\ninf,1.0,1.0,2.0,5.0\n", TRACK_LOG_HEADER),
        )
        .unwrap();
        assert!(matches!(
            ReplaySensor::from_csv(&path),
            Err(TrackLogError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_tiny_time_scale_caps_delay() {
        let replay = ReplaySensor::from_samples(
            Duration::from_secs(1),
            vec![LocationSample::new(0.0, 0.0, None, 5.0); 2],
        )
        .with_time_scale(1e-300);
        assert_eq!(replay.scaled(Duration::from_secs(1)), MAX_REPLAY_DELAY);
        assert_eq!(replay.scaled(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_csv_round_trip_keeps_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.csv");
        let t0 = Utc::now();
        let samples = vec![
            LocationSample::new(12.0, 77.0, None, 30.0).at(t0),
            LocationSample::new(12.0001, 77.0, Some(5.0), 8.0).at(t0 + chrono::Duration::seconds(2)),
        ];
        write_track_csv(&path, &samples).unwrap();

        let replay = ReplaySensor::from_csv(&path).unwrap();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay.events()[1].0, Duration::from_secs(2));
    }

    #[test]
    fn test_schedule_inserts_timeouts() {
        let sample = LocationSample::new(0.0, 0.0, Some(1.0), 5.0);
        let replay = ReplaySensor::new(vec![
            (Duration::ZERO, SensorEvent::Sample(sample.clone())),
            (Duration::from_secs(25), SensorEvent::Sample(sample)),
        ]);
        let schedule = replay.schedule(Duration::from_secs(10));
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule[1].0, Duration::from_secs(10));
        assert_eq!(schedule[1].1, SensorEvent::Error(SensorError::Timeout));
    }

    #[tokio::test]
    async fn test_replay_delivers_in_order_then_closes() {
        let samples: Vec<_> = (0..5)
            .map(|i| LocationSample::new(0.0, i as f64, Some(1.0), 5.0))
            .collect();
        let mut replay =
            ReplaySensor::from_samples(Duration::from_secs(1), samples).with_time_scale(0.0);
        let (tx, mut rx) = mpsc::channel(8);
        replay.subscribe(SubscribeOptions::default(), tx).unwrap();

        let mut longitudes = Vec::new();
        while let Some(event) = rx.recv().await {
            if let SensorEvent::Sample(s) = event {
                longitudes.push(s.longitude);
            }
        }
        assert_eq!(longitudes, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
