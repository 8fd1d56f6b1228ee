//! Mock transports for testing.
//!
//! This module provides [`MockBle`] and [`MockWifi`], in-memory
//! implementations of the transport traits for unit testing without real
//! radios.
//!
//! # Features
//!
//! - **Failure injection**: fail connects, writes, or network joins
//! - **Latency simulation**: artificial delays on connect
//! - **Notification push**: feed swing samples into subscribed handlers
//! - **Write capture**: every command frame written is recorded

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::scan::{DiscoveredDevice, ScanOptions};
use crate::traits::{BleTransport, NotificationHandler, WifiTransport};

/// A mock BLE transport for testing.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use topspin_core::{BleTransport, MockBle};
///
/// #[tokio::main]
/// async fn main() {
///     let ble = Arc::new(MockBle::new());
///     let devices = ble.scan(Default::default()).await.unwrap();
///     ble.connect(&devices[0].id).await.unwrap();
///     assert!(ble.is_connected().await);
/// }
/// ```
pub struct MockBle {
    devices: Mutex<Vec<DiscoveredDevice>>,
    connected: AtomicBool,
    subscribed: AtomicBool,
    handlers: Mutex<Vec<NotificationHandler>>,
    disconnect_handlers: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
    writes: Mutex<Vec<Vec<u8>>>,
    fail_connects: AtomicBool,
    fail_writes: AtomicBool,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockBle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBle")
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("subscribed", &self.subscribed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MockBle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBle {
    /// Create a mock with one discoverable tracker.
    pub fn new() -> Self {
        let address = format!(
            "MOCK-{:06X}",
            rand::random::<u32>() % 0xFF_FFFF
        );
        let tracker = DiscoveredDevice {
            name: Some("Topspin-Tracker".to_string()),
            id: address.clone(),
            address,
            rssi: Some(-50),
            is_tracker: true,
        };
        Self {
            devices: Mutex::new(vec![tracker]),
            connected: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            handlers: Mutex::new(Vec::new()),
            disconnect_handlers: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            fail_connects: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            connect_latency_ms: AtomicU64::new(0),
        }
    }

    /// Replace the set of discoverable devices.
    #[must_use]
    pub fn with_devices(self, devices: Vec<DiscoveredDevice>) -> Self {
        if let Ok(mut current) = self.devices.lock() {
            *current = devices;
        }
        self
    }

    /// Make every connect attempt fail.
    #[must_use]
    pub fn fail_connects(self) -> Self {
        self.fail_connects.store(true, Ordering::SeqCst);
        self
    }

    /// Make every command write fail.
    #[must_use]
    pub fn fail_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    /// Add artificial connect latency.
    #[must_use]
    pub fn connect_latency(self, latency: Duration) -> Self {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Deliver a notification payload to all subscribed handlers.
    pub fn push_notification(&self, payload: &[u8]) {
        if let Ok(handlers) = self.handlers.lock() {
            for handler in handlers.iter() {
                handler(payload);
            }
        }
    }

    /// Simulate a spontaneous link drop.
    ///
    /// Only the registered drop callbacks fire; the mock's own link
    /// bookkeeping stays stale and notifications keep flowing, matching a
    /// real stack where buffered notifications and wrapper state outlive
    /// the radio link until someone calls disconnect.
    pub fn inject_disconnect(&self) {
        if let Ok(handlers) = self.disconnect_handlers.lock() {
            for handler in handlers.iter() {
                handler();
            }
        }
    }

    /// Every frame written to the control characteristic, oldest first.
    pub fn recorded_writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Whether a notification subscription is active.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleTransport for MockBle {
    async fn scan(&self, options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
        let devices = self.devices.lock().map(|d| d.clone()).unwrap_or_default();
        Ok(if options.filter_trackers_only {
            devices.into_iter().filter(|d| d.is_tracker).collect()
        } else {
            devices
        })
    }

    async fn connect(&self, device_id: &str) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Err(Error::busy("connect"));
        }
        let latency = self.connect_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(Error::connection_failed(
                Some(device_id.to_string()),
                ConnectionFailureReason::OutOfRange,
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.subscribed.store(false, Ordering::SeqCst);
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.clear();
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.push(handler);
        }
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.subscribed.store(false, Ordering::SeqCst);
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.clear();
        }
        Ok(())
    }

    async fn write_command(&self, frame: &[u8]) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::WriteFailed {
                uuid: crate::uuid::TRACKER_CONTROL.to_string(),
                reason: "mock write failure".to_string(),
            });
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(frame.to_vec());
        }
        Ok(())
    }

    fn on_disconnect(&self, handler: Box<dyn Fn() + Send + Sync>) {
        if let Ok(mut handlers) = self.disconnect_handlers.lock() {
            handlers.push(handler);
        }
    }
}

/// A mock WiFi transport for testing.
pub struct MockWifi {
    joined: Mutex<Option<String>>,
    join_count: AtomicU64,
    fail_joins: AtomicBool,
    deny_permission: AtomicBool,
}

impl std::fmt::Debug for MockWifi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWifi")
            .field("joined", &self.joined.lock().ok().as_deref())
            .finish_non_exhaustive()
    }
}

impl Default for MockWifi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWifi {
    /// Create a mock that joins any SSID.
    pub fn new() -> Self {
        Self {
            joined: Mutex::new(None),
            join_count: AtomicU64::new(0),
            fail_joins: AtomicBool::new(false),
            deny_permission: AtomicBool::new(false),
        }
    }

    /// Make every join attempt fail.
    #[must_use]
    pub fn fail_joins(self) -> Self {
        self.fail_joins.store(true, Ordering::SeqCst);
        self
    }

    /// Simulate the OS denying network-control permission.
    #[must_use]
    pub fn deny_permission(self) -> Self {
        self.deny_permission.store(true, Ordering::SeqCst);
        self
    }

    /// Number of join attempts made.
    pub fn join_count(&self) -> u64 {
        self.join_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WifiTransport for MockWifi {
    async fn join(&self, ssid: &str) -> Result<()> {
        self.join_count.fetch_add(1, Ordering::SeqCst);
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(Error::PermissionDenied(
                "network control not granted".to_string(),
            ));
        }
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(Error::NetworkJoinFailed {
                ssid: ssid.to_string(),
                reason: "mock join failure".to_string(),
            });
        }
        if let Ok(mut joined) = self.joined.lock() {
            *joined = Some(ssid.to_string());
        }
        Ok(())
    }

    async fn leave(&self, _ssid: &str) -> Result<()> {
        if let Ok(mut joined) = self.joined.lock() {
            *joined = None;
        }
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.joined.lock().map(|j| j.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_ble_scan_and_connect() {
        let ble = MockBle::new();
        let devices = ble.scan(ScanOptions::default()).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_tracker);

        ble.connect(&devices[0].id).await.unwrap();
        assert!(ble.is_connected().await);
    }

    #[tokio::test]
    async fn test_mock_ble_records_writes() {
        let ble = MockBle::new();
        ble.connect("AA:BB").await.unwrap();
        ble.write_command(&[1u8; 20]).await.unwrap();
        assert_eq!(ble.recorded_writes(), vec![vec![1u8; 20]]);
    }

    #[tokio::test]
    async fn test_mock_ble_rejects_connect_while_connected() {
        let ble = MockBle::new();
        ble.connect("AA:BB").await.unwrap();
        let err = ble.connect("AA:BB").await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));

        ble.disconnect().await.unwrap();
        ble.connect("AA:BB").await.unwrap();
    }

    #[tokio::test]
    async fn test_mock_ble_drop_keeps_link_state_until_disconnect() {
        let ble = MockBle::new();
        ble.connect("AA:BB").await.unwrap();
        ble.subscribe(Box::new(|_| {})).await.unwrap();

        ble.inject_disconnect();
        assert!(ble.is_connected().await);
        assert!(ble.is_subscribed());

        ble.disconnect().await.unwrap();
        assert!(!ble.is_connected().await);
        assert!(!ble.is_subscribed());
    }

    #[tokio::test]
    async fn test_mock_ble_failure_injection() {
        let ble = MockBle::new().fail_connects();
        let err = ble.connect("AA:BB").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_mock_wifi_join_cycle() {
        let wifi = MockWifi::new();
        wifi.join("Topspin-Tracker").await.unwrap();
        assert_eq!(
            wifi.current_ssid().await.unwrap().as_deref(),
            Some("Topspin-Tracker")
        );

        wifi.leave("Topspin-Tracker").await.unwrap();
        assert!(wifi.current_ssid().await.unwrap().is_none());
        assert_eq!(wifi.join_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_wifi_permission_denied() {
        let wifi = MockWifi::new().deny_permission();
        let err = wifi.join("Topspin-Tracker").await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }
}
