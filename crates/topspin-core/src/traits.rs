//! Trait abstractions for tracker transports.
//!
//! This module provides the [`BleTransport`] and [`WifiTransport`] traits
//! that abstract over the real Bluetooth/WiFi stacks and mock transports
//! for testing.

use async_trait::async_trait;

use crate::error::Result;
use crate::scan::{DiscoveredDevice, ScanOptions};

/// Callback invoked for every notification payload from the control
/// characteristic.
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Trait abstracting the BLE side of a Topspin tracker.
///
/// This trait enables writing code that works with both the real btleplug
/// stack and mock transports for testing. One implementation drives one
/// tracker at a time.
///
/// # Example
///
/// ```ignore
/// use topspin_core::{BleTransport, Result};
///
/// async fn connect_first<T: BleTransport>(ble: &T) -> Result<()> {
///     let devices = ble.scan(Default::default()).await?;
///     let first = devices.first().ok_or(topspin_core::Error::NotConnected)?;
///     ble.connect(&first.id).await
/// }
/// ```
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Run a bounded discovery scan and return the trackers found.
    async fn scan(&self, options: ScanOptions) -> Result<Vec<DiscoveredDevice>>;

    /// Connect to a previously discovered tracker.
    async fn connect(&self, device_id: &str) -> Result<()>;

    /// Tear down the link.
    ///
    /// Disconnecting while already disconnected is a no-op.
    async fn disconnect(&self) -> Result<()>;

    /// Check if the link is currently up.
    async fn is_connected(&self) -> bool;

    /// Subscribe to control-characteristic notifications.
    ///
    /// The handler is called with each raw notification payload until the
    /// link drops or [`BleTransport::unsubscribe`] is called.
    async fn subscribe(&self, handler: NotificationHandler) -> Result<()>;

    /// Stop control-characteristic notifications.
    async fn unsubscribe(&self) -> Result<()>;

    /// Write a command frame to the control characteristic.
    async fn write_command(&self, frame: &[u8]) -> Result<()>;

    /// Register a callback fired when the link drops spontaneously.
    fn on_disconnect(&self, handler: Box<dyn Fn() + Send + Sync>);
}

/// Trait abstracting the phone-side WiFi operations used for bulk transfer.
///
/// The tracker exposes an open access point while its HTTP server runs;
/// implementations join and leave that network on behalf of the caller.
#[async_trait]
pub trait WifiTransport: Send + Sync {
    /// Join the open network with the given SSID.
    async fn join(&self, ssid: &str) -> Result<()>;

    /// Leave the tracker network and restore the previous connectivity.
    async fn leave(&self, ssid: &str) -> Result<()>;

    /// Return the SSID currently joined, if any.
    async fn current_ssid(&self) -> Result<Option<String>>;
}
