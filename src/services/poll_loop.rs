//! Sensing and reporting loop
//!
//! Two states:
//! - `Idle`: poll the in-zone flag every `idle_poll_interval`
//! - `Active`: read, classify, publish, wait `recheck_interval`, re-check the flag
//!
//! A zone check always precedes a sensing burst, and each burst's publish
//! precedes its own re-check. The loop runs until the shutdown signal fires,
//! at which point whatever it is awaiting is dropped and the sensor is closed.

use crate::domain::types::{OccupancyStatus, Thresholds};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::lidar::DistanceSensor;
use crate::io::particle::ZoneRemote;
use crate::services::classifier::classify;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Active,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Active => "active",
        }
    }
}

/// A state change, stamped with the number of zone checks answered so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LoopState,
    pub to: LoopState,
    pub zone_check: u64,
}

/// Loop cadence
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub recheck_interval: Duration,
    pub idle_poll_interval: Duration,
    pub zone_retry_interval: Duration,
}

impl LoopTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recheck_interval: config.recheck_interval(),
            idle_poll_interval: config.idle_poll_interval(),
            zone_retry_interval: config.zone_retry_interval(),
        }
    }
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            recheck_interval: Duration::from_secs(5),
            idle_poll_interval: Duration::from_secs(20),
            zone_retry_interval: Duration::from_secs(5),
        }
    }
}

pub struct PollLoop<S, R> {
    sensor: S,
    remote: R,
    thresholds: Thresholds,
    timing: LoopTiming,
    metrics: Arc<Metrics>,
    state: LoopState,
    zone_checks: u64,
    transition_tx: Option<mpsc::Sender<Transition>>,
}

impl<S: DistanceSensor, R: ZoneRemote> PollLoop<S, R> {
    pub fn new(
        sensor: S,
        remote: R,
        thresholds: Thresholds,
        timing: LoopTiming,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sensor,
            remote,
            thresholds,
            timing,
            metrics,
            state: LoopState::Idle,
            zone_checks: 0,
            transition_tx: None,
        }
    }

    /// Set the sender for state transitions
    pub fn with_transition_tx(mut self, tx: mpsc::Sender<Transition>) -> Self {
        self.transition_tx = Some(tx);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn zone_checks(&self) -> u64 {
        self.zone_checks
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn set_state(&mut self, to: LoopState) {
        if to == self.state {
            return;
        }

        let transition = Transition { from: self.state, to, zone_check: self.zone_checks };
        info!(
            from = %transition.from.as_str(),
            to = %transition.to.as_str(),
            zone_check = %transition.zone_check,
            "loop_state"
        );
        if to == LoopState::Active {
            self.metrics.record_activation();
        }
        self.state = to;

        if let Some(ref tx) = self.transition_tx {
            if let Err(e) = tx.try_send(transition) {
                warn!(error = %e, "failed to send loop transition");
            }
        }
    }

    /// Ask the remote whether the user is in zone
    ///
    /// A failed query is never read as "not in zone": it is retried every
    /// `zone_retry_interval` until the remote answers.
    async fn fetch_zone(&mut self) -> bool {
        loop {
            match self.remote.is_in_zone().await {
                Ok(in_zone) => {
                    self.zone_checks += 1;
                    self.metrics.record_zone_check();
                    debug!(in_zone = %in_zone, zone_check = %self.zone_checks, "zone_state");
                    return in_zone;
                }
                Err(e) => {
                    self.metrics.record_zone_check_failure();
                    warn!(
                        error = %e,
                        retry_in_secs = %self.timing.zone_retry_interval.as_secs(),
                        "zone_query_failed"
                    );
                    sleep(self.timing.zone_retry_interval).await;
                }
            }
        }
    }

    /// One sensing attempt: read, classify, publish
    ///
    /// Without a reading nothing is published for this cycle.
    async fn sense_and_publish(&mut self) -> Option<OccupancyStatus> {
        let distance = match self.sensor.read().await {
            Ok(distance) => distance,
            Err(e) => {
                self.metrics.record_sensor_failure();
                warn!(error = %e, "sensor_no_reading");
                return None;
            }
        };
        self.metrics.record_sensor_reading(distance.0);

        let status = classify(distance, &self.thresholds);
        debug!(distance_cm = %distance, status = %status.as_str(), "space_classified");

        match self.remote.publish(status).await {
            Ok(()) => self.metrics.record_publish(),
            Err(e) => {
                self.metrics.record_publish_failure();
                warn!(error = %e, status = %status.as_str(), "status_publish_failed");
            }
        }
        Some(status)
    }

    /// One pass of the outer loop
    ///
    /// Checks the zone, runs the sensing burst for as long as the user stays in
    /// zone, then waits `idle_poll_interval`.
    pub async fn run_cycle(&mut self) {
        if self.fetch_zone().await {
            self.set_state(LoopState::Active);
            loop {
                self.sense_and_publish().await;
                sleep(self.timing.recheck_interval).await;
                if !self.fetch_zone().await {
                    break;
                }
            }
            self.set_state(LoopState::Idle);
        }

        sleep(self.timing.idle_poll_interval).await;
    }

    async fn drive(&mut self) {
        loop {
            self.run_cycle().await;
        }
    }

    /// Run until shutdown, then release the sensor
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            traffic_cm = %self.thresholds.traffic_cm,
            nothing_cm = %self.thresholds.nothing_cm,
            recheck_secs = %self.timing.recheck_interval.as_secs(),
            idle_poll_secs = %self.timing.idle_poll_interval.as_secs(),
            "poll_loop_started"
        );

        tokio::select! {
            // A dropped sender also ends the loop
            _ = shutdown.wait_for(|stop| *stop) => {}
            _ = self.drive() => {}
        }

        info!(state = %self.state.as_str(), "poll_loop_shutdown");
        self.sensor.close();
    }
}
