//! Demo Mode - Simulated location sensor
//!
//! Generates a plausible drive for testing without real GPS hardware: the
//! vehicle pulls away, cruises, brakes to a stop and waits, with a wandering
//! heading. Accuracy starts poor (cold start) and occasionally spikes to
//! simulate multipath reflections.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{LocationSample, LocationSensor, SensorError, SensorEvent, SubscribeOptions, SubscriptionId};
use crate::geo::GeoPoint;

const ACCELERATION_MPS2: f64 = 2.5;
const BRAKING_MPS2: f64 = 3.5;
const COLD_START_MS: u64 = 5_000;
/// Accuracy penalty applied when high accuracy is not requested
const COARSE_FACTOR: f64 = 3.0;

/// Parameters of the simulated drive
#[derive(Debug, Clone)]
pub struct DemoRoute {
    /// Where the drive starts
    pub start: GeoPoint,
    /// Initial heading in degrees clockwise from north
    pub heading_deg: f64,
    /// Time between fixes
    pub interval: Duration,
    /// Cruise speed range in km/h
    pub cruise_speed_kmh: (f64, f64),
    /// Chance of a multipath accuracy spike on any fix
    pub glitch_probability: f64,
    /// Fixed RNG seed for reproducible drives
    pub seed: Option<u64>,
}

impl Default for DemoRoute {
    fn default() -> Self {
        Self {
            start: GeoPoint::new(12.9716, 77.5946),
            heading_deg: 90.0,
            interval: Duration::from_secs(1),
            cruise_speed_kmh: (30.0, 60.0),
            glitch_probability: 0.05,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DrivePhase {
    /// Standing still until the given time
    Stopped { until_ms: u64 },
    /// Speeding up towards a cruise speed
    Accelerating { target_mps: f64 },
    /// Holding speed around a target until the given time
    Cruising { until_ms: u64, target_mps: f64 },
    /// Slowing to a stop
    Braking,
}

/// Deterministic drive simulation, advanced one fix at a time
pub struct DemoDrive {
    route: DemoRoute,
    position: GeoPoint,
    heading_deg: f64,
    speed_mps: f64,
    phase: DrivePhase,
    elapsed_ms: u64,
    fixes: u64,
    rng: StdRng,
}

impl DemoDrive {
    /// Create a new drive simulation
    pub fn new(route: DemoRoute) -> Self {
        let rng = match route.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            position: route.start,
            heading_deg: route.heading_deg,
            speed_mps: 0.0,
            phase: DrivePhase::Stopped { until_ms: 2_000 },
            elapsed_ms: 0,
            fixes: 0,
            rng,
            route,
        }
    }

    /// Current true position (before accuracy noise)
    pub fn position(&self) -> GeoPoint {
        self.position
    }

    /// Current true speed in m/s
    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    /// Advance the simulation by `dt` and produce the resulting fix
    pub fn step(&mut self, dt: Duration, high_accuracy: bool, timestamp: DateTime<Utc>) -> LocationSample {
        let dt_s = dt.as_secs_f64();
        self.elapsed_ms += dt.as_millis() as u64;
        self.fixes += 1;

        self.update_phase();

        match self.phase {
            DrivePhase::Stopped { .. } => self.speed_mps = 0.0,
            DrivePhase::Accelerating { target_mps } => {
                self.speed_mps = (self.speed_mps + ACCELERATION_MPS2 * dt_s).min(target_mps);
            }
            DrivePhase::Cruising { target_mps, .. } => {
                self.speed_mps = (target_mps + self.rng.gen_range(-0.5..0.5)).max(0.0);
            }
            DrivePhase::Braking => {
                self.speed_mps = (self.speed_mps - BRAKING_MPS2 * dt_s).max(0.0);
            }
        }

        if self.speed_mps > 0.0 {
            self.heading_deg = (self.heading_deg + self.rng.gen_range(-3.0..3.0)).rem_euclid(360.0);
            self.position = self.position.offset(self.speed_mps * dt_s, self.heading_deg);
        }

        let mut accuracy = self.rng.gen_range(4.0..12.0);
        if self.elapsed_ms < COLD_START_MS {
            accuracy += 45.0 * (1.0 - self.elapsed_ms as f64 / COLD_START_MS as f64);
        } else if self.rng.gen_bool(self.route.glitch_probability.clamp(0.0, 1.0)) {
            accuracy = self.rng.gen_range(25.0..60.0);
        }
        if !high_accuracy {
            accuracy *= COARSE_FACTOR;
        }

        // Many devices report no speed on the very first fix
        let speed = if self.fixes == 1 {
            None
        } else {
            Some(self.speed_mps)
        };

        LocationSample {
            latitude: self.position.latitude,
            longitude: self.position.longitude,
            speed_mps: speed,
            accuracy_m: accuracy,
            timestamp,
        }
    }

    fn update_phase(&mut self) {
        match self.phase {
            DrivePhase::Stopped { until_ms } => {
                if self.elapsed_ms >= until_ms {
                    let (lo, hi) = self.route.cruise_speed_kmh;
                    let target_kmh = if hi > lo {
                        self.rng.gen_range(lo..hi)
                    } else {
                        lo
                    };
                    self.phase = DrivePhase::Accelerating {
                        target_mps: target_kmh / 3.6,
                    };
                }
            }
            DrivePhase::Accelerating { target_mps } => {
                if self.speed_mps >= target_mps {
                    let hold = self.rng.gen_range(15_000..45_000);
                    self.phase = DrivePhase::Cruising {
                        until_ms: self.elapsed_ms + hold,
                        target_mps,
                    };
                }
            }
            DrivePhase::Cruising { until_ms, .. } => {
                if self.elapsed_ms >= until_ms {
                    self.phase = DrivePhase::Braking;
                }
            }
            DrivePhase::Braking => {
                if self.speed_mps <= 0.0 {
                    let wait = self.rng.gen_range(3_000..10_000);
                    self.phase = DrivePhase::Stopped {
                        until_ms: self.elapsed_ms + wait,
                    };
                }
            }
        }
    }
}

/// Location sensor backed by [`DemoDrive`], emitting on a fixed interval
pub struct DemoSensor {
    route: DemoRoute,
    next_id: u64,
    subscriptions: HashMap<SubscriptionId, (CancellationToken, JoinHandle<()>)>,
}

impl DemoSensor {
    /// Create a demo sensor for the given route
    pub fn new(route: DemoRoute) -> Self {
        Self {
            route,
            next_id: 1,
            subscriptions: HashMap::new(),
        }
    }

    /// Number of live subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Default for DemoSensor {
    fn default() -> Self {
        Self::new(DemoRoute::default())
    }
}

impl LocationSensor for DemoSensor {
    fn subscribe(
        &mut self,
        options: SubscribeOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionId, SensorError> {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let token = CancellationToken::new();
        let cancel = token.clone();
        let mut drive = DemoDrive::new(self.route.clone());
        let interval = self.route.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let sample = drive.step(interval, options.high_accuracy, Utc::now());
                        if events.send(SensorEvent::Sample(sample)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!(id = id.0, interval_ms = interval.as_millis() as u64, "demo sensor subscribed");
        self.subscriptions.insert(id, (token, handle));
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some((token, handle)) = self.subscriptions.remove(&id) {
            token.cancel();
            handle.abort();
            tracing::debug!(id = id.0, "demo sensor unsubscribed");
        }
    }
}

impl Drop for DemoSensor {
    fn drop(&mut self) {
        for (_, (token, handle)) in self.subscriptions.drain() {
            token.cancel();
            handle.abort();
        }
    }
}
