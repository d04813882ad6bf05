//! Particle cloud client for the in-zone flag and the parking status
//!
//! Endpoints (per device):
//! - `GET  {base}/{device}/{zone_variable}?access_token=..` -> `{"result": bool, ..}`
//! - `POST {base}/{device}/{status_function}` form `arg=<TAG>&access_token=..`
//!
//! The cloud penalises clients that poll too often, so each endpoint is paced.

use crate::domain::types::OccupancyStatus;
use crate::infra::config::Config;
use crate::infra::pacer::Pacer;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote side of the loop: the in-zone flag and the status sink
#[async_trait]
pub trait ZoneRemote: Send {
    /// Fetch the current in-zone flag
    async fn is_in_zone(&mut self) -> Result<bool, RemoteError>;

    /// Push one status to the remote; the caller does not retry
    async fn publish(&mut self, status: OccupancyStatus) -> Result<(), RemoteError>;
}

/// Cloud variable read response; only `result` matters
#[derive(Debug, Deserialize)]
struct VariableResponse {
    #[serde(default)]
    result: Option<bool>,
}

/// Cloud function call response
#[derive(Debug, Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    return_value: Option<i64>,
}

pub struct ParticleClient {
    http_client: reqwest::Client,
    zone_url: String,
    status_url: String,
    access_token: String,
    zone_pacer: Pacer,
    publish_pacer: Pacer,
}

impl ParticleClient {
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        // Create HTTP client once for reuse (connection pooling)
        let http_client = reqwest::Client::builder().timeout(config.request_timeout()).build()?;

        let base = config.particle_base_url().trim_end_matches('/');
        let zone_url = format!("{}/{}/{}", base, config.device_id(), config.zone_variable());
        let status_url = format!("{}/{}/{}", base, config.device_id(), config.status_function());

        Ok(Self {
            http_client,
            zone_url,
            status_url,
            access_token: config.access_token().to_string(),
            zone_pacer: Pacer::new(config.min_request_interval()),
            publish_pacer: Pacer::new(config.min_request_interval()),
        })
    }

    pub fn zone_url(&self) -> &str {
        &self.zone_url
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }
}

#[async_trait]
impl ZoneRemote for ParticleClient {
    async fn is_in_zone(&mut self) -> Result<bool, RemoteError> {
        self.zone_pacer.ready().await;
        let start = Instant::now();

        let response = self
            .http_client
            .get(&self.zone_url)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status { endpoint: "zone_variable", status: status.as_u16() });
        }

        let body = response.text().await?;
        let parsed: VariableResponse = serde_json::from_str(&body)?;
        let in_zone = parsed.result.unwrap_or(false);

        debug!(
            in_zone = %in_zone,
            has_result = %parsed.result.is_some(),
            latency_ms = %start.elapsed().as_millis(),
            "zone_query"
        );
        Ok(in_zone)
    }

    async fn publish(&mut self, status: OccupancyStatus) -> Result<(), RemoteError> {
        self.publish_pacer.ready().await;
        let start = Instant::now();

        let response = self
            .http_client
            .post(&self.status_url)
            .form(&[("arg", status.as_tag()), ("access_token", self.access_token.as_str())])
            .send()
            .await?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(RemoteError::Status {
                endpoint: "status_function",
                status: http_status.as_u16(),
            });
        }

        // The function's return value is informational only
        let return_value = response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<FunctionResponse>(&body).ok())
            .and_then(|r| r.return_value);

        info!(
            status = %status.as_str(),
            tag = %status.as_tag(),
            return_value = ?return_value,
            latency_ms = %start.elapsed().as_millis(),
            "status_published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::default()
            .with_credentials(Some("tok".to_string()), Some("dev-1".to_string()))
            .with_particle_base_url("http://127.0.0.1:9/v1/devices/")
    }

    #[test]
    fn test_urls_built_from_config() {
        let client = ParticleClient::new(&test_config()).unwrap();
        assert_eq!(client.zone_url(), "http://127.0.0.1:9/v1/devices/dev-1/home");
        assert_eq!(client.status_url(), "http://127.0.0.1:9/v1/devices/dev-1/parkingStatus");
    }

    #[test]
    fn test_variable_response_missing_result() {
        let parsed: VariableResponse =
            serde_json::from_str(r#"{"cmd":"VarReturn","name":"home"}"#).unwrap();
        assert_eq!(parsed.result, None);

        let parsed: VariableResponse =
            serde_json::from_str(r#"{"cmd":"VarReturn","name":"home","result":true}"#).unwrap();
        assert_eq!(parsed.result, Some(true));
    }
}
