//! Bulk transfer coordinator: BLE-to-WiFi hand-off for shot history.
//!
//! Large shot-history downloads are too slow for the BLE link, so the
//! tracker brings up its own access point and HTTP server on request. This
//! module drives the phone side of the hand-off as explicit awaited steps:
//! join the tracker network, wait for the device's server to settle, fetch
//! the CSV blob, then leave the network.
//!
//! The coordinator never retries on its own: joining the tracker's AP drops
//! the phone's normal connectivity, so every attempt is an explicit caller
//! decision.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::events::{DeviceEvent, EventDispatcher};
use crate::http::DeviceHttpClient;
use crate::traits::WifiTransport;
use crate::wifi::TRACKER_SSID;

/// How long to wait after joining the tracker network before the first
/// HTTP request.
///
/// The tracker's access point and HTTP server take a few seconds to come up
/// after the ServerOn command; empirically 3-4 seconds is enough. This is a
/// policy constant, not a protocol requirement. Tune it via
/// [`BulkOptions::settle_delay`].
pub const SETTLE_DELAY: Duration = Duration::from_millis(3500);

/// Phase of a bulk transfer.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new phases
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
#[non_exhaustive]
pub enum BulkPhase {
    /// No transfer running.
    Idle,
    /// Joining the tracker's access point.
    AwaitingNetwork,
    /// Joined; waiting for the device's HTTP server to settle.
    Joined,
    /// Fetching the shot-history blob.
    Fetching,
    /// Terminal: transfer finished with this many bytes.
    Complete { bytes: usize },
    /// Terminal: transfer failed.
    Failed { reason: String },
}

/// Result of a successful bulk transfer.
///
/// The payload is opaque CSV text; the core validates nothing beyond
/// non-emptiness. A fresh fetch always re-requests, nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkTransferResult {
    /// The raw CSV payload.
    pub data: String,
}

impl BulkTransferResult {
    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Options for a bulk transfer.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// SSID of the tracker's access point.
    pub ssid: String,
    /// Credential for the tracker network. Open network today, so empty;
    /// carried through so a future firmware can authenticate the join.
    pub credential: String,
    /// Base URL of the tracker's HTTP server.
    pub base_url: String,
    /// Settle interval between join and first request.
    pub settle_delay: Duration,
    /// Whether to leave the tracker network when the transfer finishes.
    pub leave_on_finish: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            ssid: TRACKER_SSID.to_string(),
            credential: String::new(),
            base_url: DeviceHttpClient::DEFAULT_BASE_URL.to_string(),
            settle_delay: SETTLE_DELAY,
            leave_on_finish: true,
        }
    }
}

impl BulkOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tracker network SSID.
    #[must_use]
    pub fn ssid(mut self, ssid: impl Into<String>) -> Self {
        self.ssid = ssid.into();
        self
    }

    /// Set the settle delay between join and first request.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the base URL of the tracker's HTTP server.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Control whether the tracker network is left after the transfer.
    #[must_use]
    pub fn leave_on_finish(mut self, leave: bool) -> Self {
        self.leave_on_finish = leave;
        self
    }
}

/// Drives one bulk transfer at a time over a WiFi transport.
///
/// Only one transfer may be in flight; a second request while one runs is
/// rejected with [`Error::Busy`]. A new attempt is allowed as soon as the
/// previous one reaches `Complete` or `Failed`.
pub struct BulkCoordinator<W: WifiTransport> {
    wifi: Arc<W>,
    options: BulkOptions,
    events: EventDispatcher,
    in_flight: AtomicBool,
    phase: std::sync::Mutex<BulkPhase>,
}

/// Clears the in-flight flag when the transfer attempt ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<W: WifiTransport> BulkCoordinator<W> {
    /// Create a coordinator over the given WiFi transport.
    pub fn new(wifi: Arc<W>, options: BulkOptions, events: EventDispatcher) -> Self {
        Self {
            wifi,
            options,
            events,
            in_flight: AtomicBool::new(false),
            phase: std::sync::Mutex::new(BulkPhase::Idle),
        }
    }

    /// Snapshot of the current phase.
    pub fn phase(&self) -> BulkPhase {
        self.phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or(BulkPhase::Idle)
    }

    /// Whether a transfer is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: BulkPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.clone();
        }
        self.events.send(DeviceEvent::BulkPhaseChanged { phase });
    }

    /// Run a full transfer: join, settle, fetch, leave.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if a transfer is already in flight,
    /// [`Error::PermissionDenied`] if the OS refuses network control, and
    /// the usual join/timeout/HTTP errors otherwise. Every failure also
    /// moves the phase to `Failed` before returning.
    #[tracing::instrument(level = "info", skip(self), fields(ssid = %self.options.ssid))]
    pub async fn run(&self) -> Result<BulkTransferResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::busy("bulk transfer"));
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.run_steps().await {
            Ok(result) => {
                self.set_phase(BulkPhase::Complete {
                    bytes: result.len(),
                });
                info!("Bulk transfer complete ({} bytes)", result.len());
                Ok(result)
            }
            Err(e) => {
                self.set_phase(BulkPhase::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_steps(&self) -> Result<BulkTransferResult> {
        self.set_phase(BulkPhase::AwaitingNetwork);
        self.wifi.join(&self.options.ssid).await?;

        self.set_phase(BulkPhase::Joined);
        info!(
            "Joined '{}', settling for {:?}",
            self.options.ssid, self.options.settle_delay
        );
        sleep(self.options.settle_delay).await;

        self.set_phase(BulkPhase::Fetching);
        let fetch_result = self.fetch().await;

        if self.options.leave_on_finish
            && let Err(e) = self.wifi.leave(&self.options.ssid).await
        {
            warn!("Could not leave tracker network: {}", e);
        }

        fetch_result
    }

    async fn fetch(&self) -> Result<BulkTransferResult> {
        let client = DeviceHttpClient::new(&self.options.base_url)?;
        let data = client.fetch_data().await?;
        if data.is_empty() {
            return Err(Error::InvalidData("empty shot history payload".into()));
        }
        Ok(BulkTransferResult { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = BulkOptions::default();
        assert_eq!(options.ssid, TRACKER_SSID);
        assert!(options.credential.is_empty());
        assert_eq!(options.settle_delay, SETTLE_DELAY);
        assert!(options.leave_on_finish);
    }

    #[test]
    fn test_options_builder() {
        let options = BulkOptions::new()
            .ssid("Court-3")
            .settle_delay(Duration::from_millis(100))
            .base_url("http://10.0.0.1");
        assert_eq!(options.ssid, "Court-3");
        assert_eq!(options.settle_delay, Duration::from_millis(100));
        assert_eq!(options.base_url, "http://10.0.0.1");
    }

    #[test]
    fn test_phase_serializes_tagged() {
        let json = serde_json::to_string(&BulkPhase::Complete { bytes: 42 }).unwrap();
        assert!(json.contains("complete"));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_result_len() {
        let result = BulkTransferResult {
            data: "ts,speed\n1,80\n".into(),
        };
        assert_eq!(result.len(), 14);
        assert!(!result.is_empty());
    }
}
