//! Configuration loading from TOML files
//!
//! The binary picks the file from `--config`, then `CONFIG_FILE`, then
//! `config/dev.toml`; a missing or invalid file falls back to defaults.
//!
//! Credentials are never baked in: `PARTICLE_ACCESS_TOKEN` and `PARTICLE_DEVICE_ID`
//! override whatever the file holds.

use crate::domain::types::Thresholds;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ACCESS_TOKEN_ENV: &str = "PARTICLE_ACCESS_TOKEN";
pub const DEVICE_ID_ENV: &str = "PARTICLE_DEVICE_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct ParticleConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub access_token: String,
    /// Cloud variable holding the "in zone" flag
    #[serde(default = "default_zone_variable")]
    pub zone_variable: String,
    /// Cloud function receiving the parking status tag
    #[serde(default = "default_status_function")]
    pub status_function: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            device_id: String::new(),
            access_token: String::new(),
            zone_variable: default_zone_variable(),
            status_function: default_status_function(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.particle.io/v1/devices".to_string()
}

fn default_zone_variable() -> String {
    "home".to_string()
}

fn default_status_function() -> String {
    "parkingStatus".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_device")]
    pub device: String,
    #[serde(default = "default_sensor_baud")]
    pub baud: u32,
    /// How long to wait for the port to report open
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    /// How long to wait for a full frame to be buffered
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
    /// Pause before the single retry after a bad frame header
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device: default_sensor_device(),
            baud: default_sensor_baud(),
            open_timeout_ms: default_open_timeout_ms(),
            frame_timeout_ms: default_frame_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_sensor_device() -> String {
    "/dev/ttyS0".to_string()
}

fn default_sensor_baud() -> u32 {
    115_200
}

fn default_open_timeout_ms() -> u64 {
    2000
}

fn default_frame_timeout_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_traffic_cm")]
    pub traffic_cm: u16,
    #[serde(default = "default_nothing_cm")]
    pub nothing_cm: u16,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self { traffic_cm: default_traffic_cm(), nothing_cm: default_nothing_cm() }
    }
}

fn default_traffic_cm() -> u16 {
    600
}

fn default_nothing_cm() -> u16 {
    800
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Cadence of the sensing loop while in zone
    #[serde(default = "default_recheck_interval_secs")]
    pub recheck_interval_secs: u64,
    /// Cadence of the zone poll while out of zone
    #[serde(default = "default_idle_poll_interval_secs")]
    pub idle_poll_interval_secs: u64,
    /// Backoff between failed zone queries
    #[serde(default = "default_zone_retry_interval_secs")]
    pub zone_retry_interval_secs: u64,
    /// Floor on the spacing of two requests to the same endpoint
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            recheck_interval_secs: default_recheck_interval_secs(),
            idle_poll_interval_secs: default_idle_poll_interval_secs(),
            zone_retry_interval_secs: default_zone_retry_interval_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

fn default_recheck_interval_secs() -> u64 {
    5
}

fn default_idle_poll_interval_secs() -> u64 {
    20
}

fn default_zone_retry_interval_secs() -> u64 {
    5
}

fn default_min_request_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub particle: ParticleConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    particle_base_url: String,
    device_id: String,
    access_token: String,
    zone_variable: String,
    status_function: String,
    request_timeout_ms: u64,
    sensor_device: String,
    sensor_baud: u32,
    sensor_open_timeout_ms: u64,
    sensor_frame_timeout_ms: u64,
    sensor_retry_delay_ms: u64,
    thresholds: Thresholds,
    recheck_interval_secs: u64,
    idle_poll_interval_secs: u64,
    zone_retry_interval_secs: u64,
    min_request_interval_ms: u64,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            particle_base_url: toml_config.particle.base_url,
            device_id: toml_config.particle.device_id,
            access_token: toml_config.particle.access_token,
            zone_variable: toml_config.particle.zone_variable,
            status_function: toml_config.particle.status_function,
            request_timeout_ms: toml_config.particle.timeout_ms,
            sensor_device: toml_config.sensor.device,
            sensor_baud: toml_config.sensor.baud,
            sensor_open_timeout_ms: toml_config.sensor.open_timeout_ms,
            sensor_frame_timeout_ms: toml_config.sensor.frame_timeout_ms,
            sensor_retry_delay_ms: toml_config.sensor.retry_delay_ms,
            thresholds: Thresholds {
                traffic_cm: toml_config.thresholds.traffic_cm,
                nothing_cm: toml_config.thresholds.nothing_cm,
            },
            recheck_interval_secs: toml_config.timing.recheck_interval_secs,
            idle_poll_interval_secs: toml_config.timing.idle_poll_interval_secs,
            zone_retry_interval_secs: toml_config.timing.zone_retry_interval_secs,
            min_request_interval_ms: toml_config.timing.min_request_interval_ms,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, path.display().to_string());
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from an explicit path, falling back to defaults on error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    /// Apply credential overrides from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_credentials(env::var(ACCESS_TOKEN_ENV).ok(), env::var(DEVICE_ID_ENV).ok())
    }

    /// Replace credentials when a non-empty value is supplied
    pub fn with_credentials(
        mut self,
        access_token: Option<String>,
        device_id: Option<String>,
    ) -> Self {
        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            self.access_token = token;
        }
        if let Some(id) = device_id.filter(|d| !d.is_empty()) {
            self.device_id = id;
        }
        self
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.thresholds.traffic_cm >= self.thresholds.nothing_cm {
            bail!(
                "thresholds.traffic_cm ({}) must be below thresholds.nothing_cm ({})",
                self.thresholds.traffic_cm,
                self.thresholds.nothing_cm
            );
        }
        if self.recheck_interval_secs == 0
            || self.idle_poll_interval_secs == 0
            || self.zone_retry_interval_secs == 0
        {
            bail!("timing intervals must be non-zero");
        }
        Ok(())
    }

    /// Check that the remote can actually be addressed
    pub fn require_credentials(&self) -> anyhow::Result<()> {
        if self.access_token.is_empty() {
            bail!("no access token configured (set {} or particle.access_token)", ACCESS_TOKEN_ENV);
        }
        if self.device_id.is_empty() {
            bail!("no device id configured (set {} or particle.device_id)", DEVICE_ID_ENV);
        }
        Ok(())
    }

    // Getters for all config fields
    pub fn particle_base_url(&self) -> &str {
        &self.particle_base_url
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn zone_variable(&self) -> &str {
        &self.zone_variable
    }

    pub fn status_function(&self) -> &str {
        &self.status_function
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sensor_device(&self) -> &str {
        &self.sensor_device
    }

    pub fn sensor_baud(&self) -> u32 {
        self.sensor_baud
    }

    pub fn sensor_open_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_open_timeout_ms)
    }

    pub fn sensor_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_frame_timeout_ms)
    }

    pub fn sensor_retry_delay(&self) -> Duration {
        Duration::from_millis(self.sensor_retry_delay_ms)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_secs(self.recheck_interval_secs)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_secs(self.idle_poll_interval_secs)
    }

    pub fn zone_retry_interval(&self) -> Duration {
        Duration::from_secs(self.zone_retry_interval_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point the client at a mock server
    pub fn with_particle_base_url(mut self, url: impl Into<String>) -> Self {
        self.particle_base_url = url.into();
        self
    }

    /// Builder method for tests to override thresholds
    #[cfg(test)]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}
