//! HTTP client for the tracker's on-device REST API.
//!
//! While bulk mode is active the tracker runs a small HTTP server on its
//! own access point. This module provides a client for that API: health
//! checks, recording control, IMU reset, and the shot-history download.
//!
//! # Example
//!
//! ```no_run
//! use topspin_core::http::DeviceHttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DeviceHttpClient::new(DeviceHttpClient::DEFAULT_BASE_URL)?;
//!
//! let health = client.health().await?;
//! println!("Firmware {} at {}% battery", health.version, health.battery);
//!
//! let csv = client.fetch_data().await?;
//! println!("Downloaded {} bytes of shot history", csv.len());
//! Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use topspin_types::{DeviceHealth, SdCardUsage};

use crate::error::{Error, Result};

/// Default timeout for requests against the tracker's HTTP server.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the tracker's device API.
#[derive(Debug, Clone)]
pub struct DeviceHttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

/// Wire form of the health endpoint.
#[derive(Debug, Deserialize)]
struct HealthWire {
    version: String,
    battery: u8,
    #[serde(default)]
    sd_card: Option<String>,
}

impl DeviceHttpClient {
    /// Address the tracker's HTTP server listens on inside its own AP.
    pub const DEFAULT_BASE_URL: &'static str = "http://192.168.4.1";

    /// Create a new client for the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        // Normalize URL (remove trailing slash)
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::invalid_config(format!(
                "base URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::invalid_config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the per-request timeout this client was built with.
    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if the tracker's HTTP server is reachable.
    pub async fn is_reachable(&self) -> bool {
        self.health().await.is_ok()
    }

    /// Fetch the tracker's health snapshot.
    pub async fn health(&self) -> Result<DeviceHealth> {
        let url = format!("{}/health", self.base_url);
        let response = self.get(&url).await?;
        let wire: HealthWire = response
            .json()
            .await
            .map_err(|e| Error::InvalidData(format!("bad health response: {}", e)))?;

        let sd_card = match wire.sd_card {
            Some(raw) => Some(SdCardUsage::parse(&raw)?),
            None => None,
        };

        Ok(DeviceHealth {
            version: wire.version,
            battery: wire.battery,
            sd_card,
        })
    }

    /// Start a recording session on the tracker.
    pub async fn start_recording(&self) -> Result<()> {
        info!("Starting recording session");
        self.post_empty("/start").await
    }

    /// Stop the current recording session.
    pub async fn stop_recording(&self) -> Result<()> {
        info!("Stopping recording session");
        self.post_empty("/stop").await
    }

    /// Re-zero the tracker's inertial sensor.
    ///
    /// The tracker should be lying flat and still when this is called.
    pub async fn reset_imu(&self) -> Result<()> {
        info!("Resetting IMU");
        self.post_empty("/reset_imu").await
    }

    /// Download the full shot history as CSV text.
    pub async fn fetch_data(&self) -> Result<String> {
        let url = format!("{}/shots.csv", self.base_url);
        let response = self.get(&url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::InvalidData(format!("bad shot history body: {}", e)))?;
        debug!("Fetched {} bytes of shot history", body.len());
        Ok(body)
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;
        Self::check_status(url, response)
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        Self::check_status(&url, response).map(|_| ())
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(format!("request {}", url), self.timeout)
        } else {
            Error::unreachable(url, e.to_string())
        }
    }

    fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let path = response.url().path().to_string();
            debug!("Tracker returned {} for {}", status, url);
            Err(Error::HttpError {
                status: status.as_u16(),
                path,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = DeviceHttpClient::new(DeviceHttpClient::DEFAULT_BASE_URL);
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "http://192.168.4.1");
    }

    #[test]
    fn test_client_normalizes_url() {
        let client = DeviceHttpClient::new("http://192.168.4.1/").unwrap();
        assert_eq!(client.base_url(), "http://192.168.4.1");
    }

    #[test]
    fn test_client_stores_configured_timeout() {
        let client =
            DeviceHttpClient::with_timeout("http://192.168.4.1", Duration::from_millis(250))
                .unwrap();
        assert_eq!(client.request_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_timeout_error_carries_configured_duration() {
        // A listener that never responds: connect succeeds, the request
        // then hits the client's own timeout
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let client = DeviceHttpClient::with_timeout(&url, Duration::from_millis(100)).unwrap();

        match client.health().await.unwrap_err() {
            Error::Timeout { duration, .. } => assert_eq!(duration, Duration::from_millis(100)),
            other => panic!("expected a timeout error, got {:?}", other),
        }
    }

    #[test]
    fn test_client_rejects_bare_host() {
        let result = DeviceHttpClient::new("192.168.4.1");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_health_wire_parses_without_sd_card() {
        let json = r#"{"version": "1.4.2", "battery": 91}"#;
        let wire: HealthWire = serde_json::from_str(json).unwrap();
        assert_eq!(wire.version, "1.4.2");
        assert_eq!(wire.battery, 91);
        assert!(wire.sd_card.is_none());
    }

    #[test]
    fn test_health_wire_parses_sd_card_string() {
        let json = r#"{"version": "1.4.2", "battery": 91, "sd_card": "1572864/31914983424"}"#;
        let wire: HealthWire = serde_json::from_str(json).unwrap();
        let usage = SdCardUsage::parse(wire.sd_card.as_deref().unwrap()).unwrap();
        assert_eq!(usage.used, 1_572_864);
    }
}
