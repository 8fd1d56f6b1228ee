//! BLE link to a Topspin tracker.
//!
//! This module provides [`BleLink`], the btleplug-backed implementation of
//! [`BleTransport`]. A link drives at most one tracker at a time: connect,
//! subscribe to swing notifications, write control frames, disconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scan::{
    DiscoveredDevice, ScanOptions, create_identifier, find_device_with_options,
    format_peripheral_id, scan_with_options,
};
use crate::traits::{BleTransport, NotificationHandler};
use crate::uuid::TRACKER_CONTROL;
use topspin_types::FRAME_LEN;

/// Default timeout for establishing a BLE connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts and behavior.
///
/// Use this to customize timeout values for different environments, for
/// example longer timeouts on a crowded court with heavy 2.4GHz traffic.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use topspin_core::link::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Scan options used when connecting by identifier.
    pub scan: ScanOptions,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            scan: ScanOptions::default(),
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the scan options used when connecting by identifier.
    #[must_use]
    pub fn scan(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }
}

/// Per-connection state, present only while a link is up.
struct LinkInner {
    /// Kept alive for the lifetime of the peripheral connection. The
    /// peripheral may hold internal references to the adapter.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
    address: String,
    /// Cache of discovered characteristics by UUID for O(1) lookup.
    characteristics: HashMap<Uuid, Characteristic>,
    /// Handles for spawned notification tasks (for cleanup).
    notification_handles: Vec<tokio::task::JoinHandle<()>>,
    /// Handle for the spontaneous-disconnect watcher task.
    watcher: Option<tokio::task::JoinHandle<()>>,
}

/// The btleplug-backed BLE transport.
///
/// # Note on Clone
///
/// This struct intentionally does not implement `Clone`. A `BleLink` owns an
/// active BLE connection with associated state (characteristic cache,
/// notification tasks). If you need to share a link across tasks, wrap it in
/// `Arc<BleLink>`.
///
/// # Cleanup
///
/// Call [`BleLink::disconnect`] before dropping the link to release BLE
/// resources. If a link is dropped while connected, a warning is logged and
/// a best-effort cleanup task is spawned.
pub struct BleLink {
    config: ConnectionConfig,
    inner: Arc<RwLock<Option<LinkInner>>>,
    disconnect_handlers: Arc<std::sync::Mutex<Vec<Box<dyn Fn() + Send + Sync>>>>,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for BleLink {
    fn default() -> Self {
        Self::new()
    }
}

impl BleLink {
    /// Create a disconnected link with default configuration.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a disconnected link with custom configuration.
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            inner: Arc::new(RwLock::new(None)),
            disconnect_handlers: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Get the current connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get the connected tracker's name, if the link is up.
    pub async fn name(&self) -> Option<String> {
        self.inner.read().await.as_ref().and_then(|i| i.name.clone())
    }

    /// Get the connected tracker's address or identifier, if the link is up.
    pub async fn address(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|i| i.address.clone())
    }

    /// Establish the link to a discovered tracker.
    #[tracing::instrument(level = "info", skip(self), fields(identifier = %identifier))]
    async fn connect_inner(&self, identifier: &str) -> Result<()> {
        {
            let inner = self.inner.read().await;
            if inner.is_some() {
                return Err(Error::busy("connect"));
            }
        }

        let (adapter, peripheral) =
            find_device_with_options(identifier, self.config.scan.clone()).await?;

        info!("Connecting to tracker...");
        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to tracker", self.config.connection_timeout))??;
        info!("Connected!");

        info!("Discovering services...");
        timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;

        let services = peripheral.services();
        debug!("Found {} services", services.len());

        let mut characteristics = HashMap::new();
        for service in &services {
            debug!("  Service: {}", service.uuid);
            for char in &service.characteristics {
                debug!("    Characteristic: {}", char.uuid);
                characteristics.insert(char.uuid, char.clone());
            }
        }
        debug!("Cached {} characteristics", characteristics.len());

        let properties = peripheral.properties().await?;
        let name = properties.as_ref().and_then(|p| p.local_name.clone());
        let address = properties
            .as_ref()
            .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
            .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));

        let watcher = self.spawn_disconnect_watcher(&adapter, &peripheral).await;

        let mut inner = self.inner.write().await;
        *inner = Some(LinkInner {
            adapter,
            peripheral,
            name,
            address,
            characteristics,
            notification_handles: Vec::new(),
            watcher,
        });

        Ok(())
    }

    /// Watch adapter events for a spontaneous disconnect of our peripheral.
    async fn spawn_disconnect_watcher(
        &self,
        adapter: &Adapter,
        peripheral: &Peripheral,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let mut events = match adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Could not watch adapter events: {}", e);
                return None;
            }
        };

        let our_id = peripheral.id();
        let handlers = Arc::clone(&self.disconnect_handlers);
        let link_state = Arc::clone(&self.inner);

        Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event
                    && id == our_id
                {
                    warn!("Tracker disconnected spontaneously");
                    // The stale link state must be gone before the handlers
                    // run; a handler may reconnect immediately.
                    if let Some(mut stale) = link_state.write().await.take() {
                        for handle in stale.notification_handles.drain(..) {
                            handle.abort();
                        }
                        // This task's own handle; dropping it detaches the
                        // task, which exits right below.
                        drop(stale.watcher.take());
                    }
                    if let Ok(handlers) = handlers.lock() {
                        for handler in handlers.iter() {
                            handler();
                        }
                    }
                    break;
                }
            }
        }))
    }

    /// Find a characteristic by UUID using the cached lookup table.
    fn find_characteristic(inner: &LinkInner, uuid: Uuid) -> Result<Characteristic> {
        inner.characteristics.get(&uuid).cloned().ok_or_else(|| {
            Error::characteristic_not_found(uuid.to_string(), inner.peripheral.services().len())
        })
    }

    /// Abort spawned tasks and disconnect the peripheral.
    async fn teardown(mut inner: LinkInner) -> Result<()> {
        for handle in inner.notification_handles.drain(..) {
            handle.abort();
        }
        if let Some(watcher) = inner.watcher.take() {
            watcher.abort();
        }
        inner.peripheral.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl BleTransport for BleLink {
    async fn scan(&self, options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
        scan_with_options(options).await
    }

    async fn connect(&self, device_id: &str) -> Result<()> {
        self.connect_inner(device_id).await
    }

    /// Tear down the link. A no-op when already disconnected.
    #[tracing::instrument(level = "info", skip(self))]
    async fn disconnect(&self) -> Result<()> {
        let inner = self.inner.write().await.take();
        match inner {
            Some(inner) => {
                info!("Disconnecting from tracker...");
                Self::teardown(inner).await
            }
            None => {
                debug!("Disconnect requested but no link is up");
                Ok(())
            }
        }
    }

    async fn is_connected(&self) -> bool {
        let inner = self.inner.read().await;
        match inner.as_ref() {
            Some(inner) => inner.peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<()> {
        let mut inner = self.inner.write().await;
        let inner = inner.as_mut().ok_or(Error::NotConnected)?;

        let characteristic = Self::find_characteristic(inner, TRACKER_CONTROL)?;
        inner.peripheral.subscribe(&characteristic).await?;

        let mut stream = inner.peripheral.notifications().await?;
        let char_uuid = characteristic.uuid;

        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == char_uuid {
                    handler(&notification.value);
                }
            }
        });

        inner.notification_handles.push(handle);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        let inner = inner.as_mut().ok_or(Error::NotConnected)?;

        let characteristic = Self::find_characteristic(inner, TRACKER_CONTROL)?;
        inner.peripheral.unsubscribe(&characteristic).await?;

        for handle in inner.notification_handles.drain(..) {
            handle.abort();
        }
        Ok(())
    }

    async fn write_command(&self, frame: &[u8]) -> Result<()> {
        if frame.len() != FRAME_LEN {
            return Err(Error::InvalidData(format!(
                "command frame must be {} bytes, got {}",
                FRAME_LEN,
                frame.len()
            )));
        }

        let inner = self.inner.read().await;
        let inner = inner.as_ref().ok_or(Error::NotConnected)?;

        let characteristic = Self::find_characteristic(inner, TRACKER_CONTROL)?;
        timeout(
            self.config.write_timeout,
            inner
                .peripheral
                .write(&characteristic, frame, WriteType::WithResponse),
        )
        .await
        .map_err(|_| Error::timeout("write control frame", self.config.write_timeout))?
        .map_err(|e| Error::WriteFailed {
            uuid: TRACKER_CONTROL.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn on_disconnect(&self, handler: Box<dyn Fn() + Send + Sync>) {
        if let Ok(mut handlers) = self.disconnect_handlers.lock() {
            handlers.push(handler);
        }
    }
}

// NOTE: Drop performs best-effort cleanup if disconnect() was not called.
// The BLE disconnect is spawned as a background task and may not complete
// during shutdown. Callers SHOULD call `link.disconnect().await` themselves.
impl Drop for BleLink {
    fn drop(&mut self) {
        let Ok(mut guard) = self.inner.try_write() else {
            return;
        };
        if let Some(mut inner) = guard.take() {
            warn!(
                device_address = %inner.address,
                "BleLink dropped without calling disconnect() - performing best-effort cleanup"
            );

            for handle in inner.notification_handles.drain(..) {
                handle.abort();
            }
            if let Some(watcher) = inner.watcher.take() {
                watcher.abort();
            }

            let peripheral = inner.peripheral.clone();
            let address = inner.address.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = peripheral.disconnect().await {
                        debug!(
                            device_address = %address,
                            error = %e,
                            "Best-effort disconnect failed (tracker may already be gone)"
                        );
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::BleTransport;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new()
            .connection_timeout(Duration::from_secs(20))
            .write_timeout(Duration::from_secs(5));
        assert_eq!(config.connection_timeout, Duration::from_secs(20));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
        assert_eq!(config.discovery_timeout, DEFAULT_DISCOVERY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_disconnect_without_link_is_noop() {
        let link = BleLink::new();
        assert!(link.disconnect().await.is_ok());
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_write_rejects_wrong_frame_length() {
        let link = BleLink::new();
        let err = link.write_command(&[1u8; 4]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let link = BleLink::new();
        let err = link.subscribe(Box::new(|_| {})).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
