//! TF-series lidar distance sensor over a serial port
//!
//! Protocol:
//! - Baud: 115200, 8N1, sensor streams frames continuously
//! - Frame: 9 bytes, starts with 0x59 0x59
//! - Distance: little-endian u16 at offset 2, centimeters
//! - Remaining bytes (strength, temperature, checksum) are ignored
//!
//! One `read()` yields one validated distance. A bad header is retried exactly
//! once after a short pause; if the retry also fails the caller gets the error
//! and skips the cycle.

use crate::domain::types::DistanceCm;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::time::{sleep, Instant};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

// Protocol constants
pub const FRAME_LEN: usize = 9;
const HEADER_BYTE: u8 = 0x59;

/// Frame reads before giving up on a bad header (first attempt + one retry)
const MAX_FRAME_ATTEMPTS: usize = 2;

/// Sleep between buffer-occupancy checks while waiting for a frame
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Sleep between checks while waiting for the port to come up
const OPEN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("serial port {device} unavailable: {reason}")]
    PortUnavailable { device: String, reason: String },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad frame header {0:#04x} {1:#04x}")]
    Framing(u8, u8),

    #[error("no complete frame buffered within {0:?}")]
    NoData(Duration),
}

fn serial_error(e: tokio_serial::Error) -> SensorError {
    SensorError::Io(std::io::Error::other(e))
}

/// Validate a frame and extract the distance
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<DistanceCm, SensorError> {
    if frame[0] != HEADER_BYTE || frame[1] != HEADER_BYTE {
        return Err(SensorError::Framing(frame[0], frame[1]));
    }
    Ok(DistanceCm(u16::from_le_bytes([frame[2], frame[3]])))
}

/// Byte-stream transport the lidar is attached to
#[async_trait]
pub trait SerialLink: Send {
    /// Device name for logs and errors
    fn name(&self) -> &str;

    fn is_open(&self) -> bool;

    /// Start opening the port; readiness is observed through `is_open`
    fn open(&mut self) -> Result<(), SensorError>;

    /// Bytes currently buffered on the input side
    fn bytes_available(&mut self) -> Result<usize, SensorError>;

    /// Discard everything buffered on the input side
    fn clear_input(&mut self) -> Result<(), SensorError>;

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SensorError>;

    fn close(&mut self);
}

/// Serial port backed by tokio-serial
pub struct TokioSerialLink {
    device: String,
    baud: u32,
    port: Option<SerialStream>,
}

impl TokioSerialLink {
    pub fn new(device: impl Into<String>, baud: u32) -> Self {
        Self { device: device.into(), baud, port: None }
    }

    fn port_mut(&mut self) -> Result<&mut SerialStream, SensorError> {
        let device = &self.device;
        self.port.as_mut().ok_or_else(|| SensorError::PortUnavailable {
            device: device.clone(),
            reason: "port not open".to_string(),
        })
    }
}

#[async_trait]
impl SerialLink for TokioSerialLink {
    fn name(&self) -> &str {
        &self.device
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn open(&mut self) -> Result<(), SensorError> {
        let port = tokio_serial::new(&self.device, self.baud)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| SensorError::PortUnavailable {
                device: self.device.clone(),
                reason: e.to_string(),
            })?;
        self.port = Some(port);
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, SensorError> {
        let count = self.port_mut()?.bytes_to_read().map_err(serial_error)?;
        Ok(count as usize)
    }

    fn clear_input(&mut self) -> Result<(), SensorError> {
        self.port_mut()?.clear(ClearBuffer::Input).map_err(serial_error)
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SensorError> {
        self.port_mut()?.read_exact(buf).await?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!(device = %self.device, "lidar_port_closed");
        }
    }
}

/// Source of distance readings driven by the poll loop
#[async_trait]
pub trait DistanceSensor: Send {
    async fn read(&mut self) -> Result<DistanceCm, SensorError>;

    /// Release the underlying connection
    fn close(&mut self);
}

pub struct SensorReader<L> {
    link: L,
    open_timeout: Duration,
    frame_timeout: Duration,
    retry_delay: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl SensorReader<TokioSerialLink> {
    pub fn from_config(config: &Config) -> Self {
        let link = TokioSerialLink::new(config.sensor_device(), config.sensor_baud());
        Self::new(
            link,
            config.sensor_open_timeout(),
            config.sensor_frame_timeout(),
            config.sensor_retry_delay(),
        )
    }
}

impl<L: SerialLink> SensorReader<L> {
    pub fn new(
        link: L,
        open_timeout: Duration,
        frame_timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self { link, open_timeout, frame_timeout, retry_delay, metrics: None }
    }

    /// Set the metrics sink for framing retries
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Open the port if needed and wait (bounded) until it reports ready
    async fn ensure_open(&mut self) -> Result<(), SensorError> {
        if self.link.is_open() {
            return Ok(());
        }

        self.link.open()?;
        let deadline = Instant::now() + self.open_timeout;
        while !self.link.is_open() {
            if Instant::now() >= deadline {
                return Err(SensorError::PortUnavailable {
                    device: self.link.name().to_string(),
                    reason: format!("not ready after {:?}", self.open_timeout),
                });
            }
            sleep(OPEN_POLL_INTERVAL).await;
        }

        info!(device = %self.link.name(), "lidar_port_opened");
        Ok(())
    }

    /// Sleep-poll until a whole frame is buffered, dropping partial data
    async fn wait_for_frame(&mut self) -> Result<(), SensorError> {
        let deadline = Instant::now() + self.frame_timeout;
        loop {
            let available = self.link.bytes_available()?;
            if available >= FRAME_LEN {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SensorError::NoData(self.frame_timeout));
            }
            if available > 0 {
                tracing::trace!(discarded = available, "lidar_partial_frame_discarded");
                self.link.clear_input()?;
            }
            sleep(FRAME_POLL_INTERVAL).await;
        }
    }

    /// Drop buffered input; a failure here never costs a reading
    fn discard_input(&mut self, stage: &'static str) {
        if let Err(e) = self.link.clear_input() {
            warn!(error = %e, stage = stage, "lidar_clear_input_failed");
        }
    }

    async fn read_frame(&mut self) -> Result<DistanceCm, SensorError> {
        self.ensure_open().await?;
        // Frames buffered during the recheck sleep are seconds old
        self.discard_input("before_read");
        self.wait_for_frame().await?;

        let mut frame = [0u8; FRAME_LEN];
        if let Err(e) = self.link.read_exact(&mut frame).await {
            // Reopen on the next cycle
            self.link.close();
            return Err(e);
        }
        // Stale bytes would misalign the next frame
        self.discard_input("after_read");

        decode_frame(&frame)
    }
}

#[async_trait]
impl<L: SerialLink> DistanceSensor for SensorReader<L> {
    async fn read(&mut self) -> Result<DistanceCm, SensorError> {
        let mut attempt = 1;
        loop {
            match self.read_frame().await {
                Err(SensorError::Framing(b0, b1)) if attempt < MAX_FRAME_ATTEMPTS => {
                    warn!(
                        header = %format!("{:02X} {:02X}", b0, b1),
                        attempt = attempt,
                        "lidar_bad_header_retrying"
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.record_framing_retry();
                    }
                    sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Ok(distance) => {
                    debug!(distance_cm = %distance, attempt = attempt, "lidar_reading");
                    return Ok(distance);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) {
        self.link.close();
    }
}
