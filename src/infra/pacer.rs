//! Minimum spacing between calls to a rate-limited endpoint
//!
//! The cloud API throttles clients that poll too often. A `Pacer` remembers when
//! the previous call went out and holds the next one back until `min_interval`
//! has passed.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_call: None }
    }

    /// Wait until a call is allowed, then mark it as made
    ///
    /// Returns how long the caller was held back.
    pub async fn ready(&mut self) -> Duration {
        let now = Instant::now();
        let held = match self.last_call {
            Some(last) if now < last + self.min_interval => {
                let deadline = last + self.min_interval;
                let wait = deadline - now;
                tracing::debug!(wait_ms = %wait.as_millis(), "pacer_holding_request");
                sleep_until(deadline).await;
                wait
            }
            _ => Duration::ZERO,
        };
        self.last_call = Some(Instant::now());
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_not_delayed() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        assert_eq!(pacer.ready().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_are_spaced() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        let start = Instant::now();
        pacer.ready().await;
        pacer.ready().await;
        pacer.ready().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_interval_elapsed() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        pacer.ready().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(pacer.ready().await, Duration::ZERO);
    }
}
