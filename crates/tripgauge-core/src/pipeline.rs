//! Sampling pipeline
//!
//! Turns the raw location stream into the speedometer readings:
//!
//! 1. every fix publishes its accuracy;
//! 2. fixes less precise than the accuracy threshold only move the status to
//!    `ACQUIRING` and are otherwise dropped (they never become a baseline);
//! 3. accepted fixes move the status to `READY`, update the exponentially
//!    smoothed speed and publish it;
//! 4. while a trip is active, the distance from the previous accepted fix is
//!    added to the trip and the matching fuel is burned;
//! 5. the accepted fix becomes the baseline for the next increment.
//!
//! Events are consumed from a single channel by a single task, so fixes are
//! processed strictly in delivery order.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::geo::haversine_distance;
use crate::sensor::{LocationSample, LocationSensor, SensorError, SensorEvent, SubscriptionId};
use crate::state::{GpsStatus, SharedState};
use crate::unit_conversion::{fuel_for_distance, mps_to_kmh};

/// What the pipeline did with a fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Accuracy worse than the threshold; fix discarded
    Rejected {
        /// Reported accuracy radius
        accuracy_m: f64,
    },
    /// Fix accepted
    Accepted {
        /// Speed after smoothing
        smoothed_speed_kmh: f64,
        /// Distance added to the trip, if any
        increment_m: Option<f64>,
    },
}

/// Per-subscription pipeline state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingSession {
    /// Most recent fix that passed the accuracy gate
    pub last_accepted: Option<LocationSample>,
    /// Current smoothed speed, seeded at 0
    pub smoothed_speed_kmh: f64,
}

/// Converts sensor events into shared-state updates
#[derive(Debug)]
pub struct SamplingPipeline {
    config: PipelineConfig,
    state: SharedState,
    session: SamplingSession,
}

impl SamplingPipeline {
    /// Create a pipeline publishing into `state`
    pub fn new(state: SharedState, config: PipelineConfig) -> Self {
        Self {
            config,
            state,
            session: SamplingSession::default(),
        }
    }

    /// Current session state
    pub fn session(&self) -> &SamplingSession {
        &self.session
    }

    /// Handle one sensor event
    pub fn process_event(&mut self, event: SensorEvent) -> Option<SampleOutcome> {
        match event {
            SensorEvent::Sample(sample) => Some(self.process_sample(sample)),
            SensorEvent::Error(err) => {
                self.process_error(&err);
                None
            }
        }
    }

    /// Handle one fix
    pub fn process_sample(&mut self, sample: LocationSample) -> SampleOutcome {
        self.state.set_gps_accuracy(sample.accuracy_m);

        if sample.accuracy_m > self.config.accuracy_threshold_m {
            self.state.set_gps_status(GpsStatus::Acquiring);
            tracing::debug!(accuracy_m = sample.accuracy_m, "fix rejected by accuracy gate");
            return SampleOutcome::Rejected {
                accuracy_m: sample.accuracy_m,
            };
        }

        self.state.set_gps_status(GpsStatus::Ready);

        let current_kmh = mps_to_kmh(sample.speed_mps.unwrap_or(0.0));
        let alpha = self.config.smoothing_alpha;
        self.session.smoothed_speed_kmh =
            alpha * current_kmh + (1.0 - alpha) * self.session.smoothed_speed_kmh;
        self.state.set_speed_kmh(self.session.smoothed_speed_kmh);

        let mut increment_m = None;
        if self.state.trip_active() {
            if let Some(baseline) = &self.session.last_accepted {
                let increment = haversine_distance(&baseline.point(), &sample.point());
                if increment > 0.0 {
                    self.state.add_distance_meters(increment);
                    let km_per_litre = self.state.vehicle_average_km_per_litre();
                    self.state
                        .consume_fuel_litres(fuel_for_distance(increment, km_per_litre));
                    increment_m = Some(increment);
                }
            }
        }

        self.session.last_accepted = Some(sample);

        SampleOutcome::Accepted {
            smoothed_speed_kmh: self.session.smoothed_speed_kmh,
            increment_m,
        }
    }

    /// Handle a sensor error. No retry is attempted here; a later fix
    /// recovers the status on its own.
    pub fn process_error(&mut self, err: &SensorError) {
        let status = if err.is_permission_denied() {
            GpsStatus::Denied
        } else {
            GpsStatus::Error
        };
        tracing::warn!(error = %err, status = %status, "location sensor error");
        self.state.set_gps_status(status);
    }

    /// Consume events until the channel closes or `cancel` fires
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SensorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.process_event(event);
                    }
                    None => break,
                },
            }
        }
        self
    }

    /// Subscribe to `sensor` and start processing its events on a new task.
    ///
    /// A sensor without location capability sets the status to `ERROR` and
    /// no task is started. Must be called from within a tokio runtime.
    pub fn activate<S>(mut sensor: S, state: SharedState, config: PipelineConfig) -> PipelineHandle<S>
    where
        S: LocationSensor + 'static,
    {
        let cancel = CancellationToken::new();
        let mut pipeline = SamplingPipeline::new(state, config);

        if !sensor.is_available() {
            pipeline.process_error(&SensorError::Unavailable);
            return PipelineHandle::idle(sensor, cancel);
        }

        let (tx, rx) = mpsc::channel(pipeline.config.channel_capacity.max(1));
        let options = pipeline.config.subscribe_options();
        let subscription = match sensor.subscribe(options, tx) {
            Ok(id) => id,
            Err(err) => {
                pipeline.process_error(&err);
                return PipelineHandle::idle(sensor, cancel);
            }
        };

        tracing::info!(
            high_accuracy = options.high_accuracy,
            timeout_ms = options.timeout.as_millis() as u64,
            "location subscription started"
        );

        let task = tokio::spawn(pipeline.run(rx, cancel.clone()));
        PipelineHandle {
            sensor,
            subscription: Some(subscription),
            cancel,
            task: Some(task),
        }
    }
}

/// A running pipeline and the sensor subscription feeding it
pub struct PipelineHandle<S: LocationSensor> {
    sensor: S,
    subscription: Option<SubscriptionId>,
    cancel: CancellationToken,
    task: Option<JoinHandle<SamplingPipeline>>,
}

impl<S: LocationSensor> PipelineHandle<S> {
    fn idle(sensor: S, cancel: CancellationToken) -> Self {
        Self {
            sensor,
            subscription: None,
            cancel,
            task: None,
        }
    }

    /// Whether a consumer task was started and has not finished
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait until the sensor stops delivering events, then tear down.
    ///
    /// Returns the pipeline for inspection, or `None` if it never started.
    pub async fn finished(mut self) -> Option<SamplingPipeline> {
        let pipeline = match self.task.take() {
            Some(task) => task.await.ok(),
            None => None,
        };
        self.unsubscribe();
        pipeline
    }

    /// Cancel the subscription and stop processing. An event already being
    /// processed completes first.
    pub async fn deactivate(mut self) -> Option<SamplingPipeline> {
        self.unsubscribe();
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await.ok(),
            None => None,
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.sensor.unsubscribe(id);
            tracing::info!("location subscription stopped");
        }
    }
}

impl<S: LocationSensor> Drop for PipelineHandle<S> {
    fn drop(&mut self) {
        self.unsubscribe();
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(lat: f64, lon: f64, speed: Option<f64>, accuracy: f64) -> LocationSample {
        LocationSample::new(lat, lon, speed, accuracy)
    }

    fn pipeline() -> (SamplingPipeline, SharedState) {
        let state = SharedState::default();
        (
            SamplingPipeline::new(state.clone(), PipelineConfig::default()),
            state,
        )
    }

    #[test]
    fn test_accuracy_boundary_is_inclusive() {
        let (mut p, state) = pipeline();
        let outcome = p.process_sample(sample(0.0, 0.0, Some(1.0), 20.0));
        assert!(matches!(outcome, SampleOutcome::Accepted { .. }));
        assert_eq!(state.gps_status(), GpsStatus::Ready);
    }

    #[test]
    fn test_rejected_fix_keeps_baseline() {
        let (mut p, state) = pipeline();
        p.process_sample(sample(0.0, 0.0, Some(1.0), 10.0));
        let baseline = p.session().last_accepted.clone();

        let outcome = p.process_sample(sample(1.0, 1.0, Some(1.0), 21.0));
        assert_eq!(outcome, SampleOutcome::Rejected { accuracy_m: 21.0 });
        assert_eq!(p.session().last_accepted, baseline);
        assert_eq!(state.gps_status(), GpsStatus::Acquiring);
        assert_eq!(state.snapshot().gps_accuracy, Some(21.0));
    }

    #[test]
    fn test_missing_speed_counts_as_zero() {
        let (mut p, state) = pipeline();
        p.process_sample(sample(0.0, 0.0, Some(10.0), 5.0));
        // 0.3 * 36
        assert!((state.snapshot().speed_kmh - 10.8).abs() < 1e-9);
        p.process_sample(sample(0.0, 0.0, None, 5.0));
        assert!((state.snapshot().speed_kmh - 7.56).abs() < 1e-9);
    }

    #[test]
    fn test_no_distance_without_trip_but_baseline_refreshes() {
        let (mut p, state) = pipeline();
        p.process_sample(sample(0.0, 0.0, Some(1.0), 5.0));
        let outcome = p.process_sample(sample(0.0, 0.01, Some(1.0), 5.0));
        assert!(matches!(
            outcome,
            SampleOutcome::Accepted {
                increment_m: None,
                ..
            }
        ));
        assert_eq!(state.snapshot().distance_meters, 0.0);
        assert_eq!(p.session().last_accepted.as_ref().unwrap().longitude, 0.01);
    }

    #[test]
    fn test_first_fix_in_trip_has_no_increment() {
        let (mut p, state) = pipeline();
        state.start_trip(Utc::now());
        let outcome = p.process_sample(sample(0.0, 0.0, Some(1.0), 5.0));
        assert!(matches!(
            outcome,
            SampleOutcome::Accepted {
                increment_m: None,
                ..
            }
        ));
    }

    #[test]
    fn test_stationary_fix_adds_nothing() {
        let (mut p, state) = pipeline();
        state.start_trip(Utc::now());
        p.process_sample(sample(10.0, 10.0, Some(0.0), 5.0));
        p.process_sample(sample(10.0, 10.0, Some(0.0), 5.0));
        let snap = state.snapshot();
        assert_eq!(snap.distance_meters, 0.0);
        assert_eq!(snap.remaining_fuel_litres, 10.0);
    }

    #[test]
    fn test_error_mapping() {
        let (mut p, state) = pipeline();
        p.process_error(&SensorError::PermissionDenied);
        assert_eq!(state.gps_status(), GpsStatus::Denied);
        p.process_error(&SensorError::Timeout);
        assert_eq!(state.gps_status(), GpsStatus::Error);

        // A later good fix recovers
        p.process_sample(sample(0.0, 0.0, None, 3.0));
        assert_eq!(state.gps_status(), GpsStatus::Ready);
    }
}
