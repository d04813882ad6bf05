//! Lock-free metrics collection and periodic reporting
//!
//! All counter updates are lock-free; `report()` swaps the per-interval
//! counters to zero to get a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Lock-free metrics collector
pub struct Metrics {
    /// Zone queries that returned a value (monotonic)
    zone_checks_total: AtomicU64,
    /// Zone queries that failed and were retried (reset on report)
    zone_check_failures: AtomicU64,
    /// Statuses accepted by the remote (monotonic)
    publishes_total: AtomicU64,
    /// Publishes that failed (reset on report)
    publish_failures: AtomicU64,
    /// Valid distance readings (reset on report)
    sensor_readings: AtomicU64,
    /// Cycles that ended without a reading (reset on report)
    sensor_failures: AtomicU64,
    /// Bad frame headers that triggered the retry (reset on report)
    framing_retries: AtomicU64,
    /// Idle -> Active transitions (monotonic)
    activations_total: AtomicU64,
    /// Last distance seen, in cm (gauge)
    last_distance_cm: AtomicU64,
    last_report: std::sync::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            zone_checks_total: AtomicU64::new(0),
            zone_check_failures: AtomicU64::new(0),
            publishes_total: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            sensor_readings: AtomicU64::new(0),
            sensor_failures: AtomicU64::new(0),
            framing_retries: AtomicU64::new(0),
            activations_total: AtomicU64::new(0),
            last_distance_cm: AtomicU64::new(0),
            last_report: std::sync::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_zone_check(&self) {
        self.zone_checks_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_zone_check_failure(&self) {
        self.zone_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_publish(&self) {
        self.publishes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sensor_reading(&self, distance_cm: u16) {
        self.sensor_readings.fetch_add(1, Ordering::Relaxed);
        self.last_distance_cm.store(u64::from(distance_cm), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sensor_failure(&self) {
        self.sensor_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_framing_retry(&self) {
        self.framing_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_activation(&self) {
        self.activations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn zone_checks_total(&self) -> u64 {
        self.zone_checks_total.load(Ordering::Relaxed)
    }

    pub fn publishes_total(&self) -> u64 {
        self.publishes_total.load(Ordering::Relaxed)
    }

    pub fn activations_total(&self) -> u64 {
        self.activations_total.load(Ordering::Relaxed)
    }

    /// Take a snapshot, resetting the per-interval counters
    pub fn report(&self) -> MetricsSummary {
        let interval_secs = match self.last_report.lock() {
            Ok(mut last) => {
                let elapsed = last.elapsed().as_secs_f64();
                *last = Instant::now();
                elapsed
            }
            Err(_) => 0.0,
        };

        MetricsSummary {
            interval_secs,
            zone_checks_total: self.zone_checks_total.load(Ordering::Relaxed),
            zone_check_failures: self.zone_check_failures.swap(0, Ordering::Relaxed),
            publishes_total: self.publishes_total.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.swap(0, Ordering::Relaxed),
            sensor_readings: self.sensor_readings.swap(0, Ordering::Relaxed),
            sensor_failures: self.sensor_failures.swap(0, Ordering::Relaxed),
            framing_retries: self.framing_retries.swap(0, Ordering::Relaxed),
            activations_total: self.activations_total.load(Ordering::Relaxed),
            last_distance_cm: self.last_distance_cm.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub interval_secs: f64,
    pub zone_checks_total: u64,
    pub zone_check_failures: u64,
    pub publishes_total: u64,
    pub publish_failures: u64,
    pub sensor_readings: u64,
    pub sensor_failures: u64,
    pub framing_retries: u64,
    pub activations_total: u64,
    pub last_distance_cm: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            interval_secs = format!("{:.1}", self.interval_secs),
            zone_checks = %self.zone_checks_total,
            zone_failures = %self.zone_check_failures,
            publishes = %self.publishes_total,
            publish_failures = %self.publish_failures,
            readings = %self.sensor_readings,
            sensor_failures = %self.sensor_failures,
            framing_retries = %self.framing_retries,
            activations = %self.activations_total,
            last_distance_cm = %self.last_distance_cm,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.zone_checks_total(), 0);
        assert_eq!(metrics.publishes_total(), 0);
    }

    #[test]
    fn test_report_resets_interval_counters() {
        let metrics = Metrics::new();
        metrics.record_zone_check();
        metrics.record_publish();
        metrics.record_publish_failure();
        metrics.record_sensor_reading(712);
        metrics.record_sensor_failure();
        metrics.record_framing_retry();

        let first = metrics.report();
        assert_eq!(first.zone_checks_total, 1);
        assert_eq!(first.publishes_total, 1);
        assert_eq!(first.publish_failures, 1);
        assert_eq!(first.sensor_readings, 1);
        assert_eq!(first.sensor_failures, 1);
        assert_eq!(first.framing_retries, 1);
        assert_eq!(first.last_distance_cm, 712);

        let second = metrics.report();
        assert_eq!(second.zone_checks_total, 1, "totals are monotonic");
        assert_eq!(second.publish_failures, 0);
        assert_eq!(second.sensor_readings, 0);
        assert_eq!(second.last_distance_cm, 712, "gauge survives reports");
    }
}
