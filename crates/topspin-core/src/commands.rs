//! Command dispatcher: high-level intents over the right transport.
//!
//! The dispatcher translates caller intents into transport operations and
//! sequences the BLE-to-WiFi hand-off:
//!
//! - recording control (`start_session`, `stop_session`, `reset_sensor`)
//!   goes over the tracker's HTTP API and requires the device to be
//!   WiFi-reachable;
//! - bulk-mode control (`enable_bulk_mode`, `disable_bulk_mode`) goes over
//!   BLE as a single 20-byte control frame and requires an active link.

use std::sync::Arc;

use tracing::info;

use topspin_types::{CommandFrame, DeviceHealth, Opcode};

use crate::bulk::{BulkCoordinator, BulkTransferResult};
use crate::error::{Error, Result};
use crate::http::DeviceHttpClient;
use crate::session::Session;
use crate::traits::{BleTransport, WifiTransport};

/// Dispatches high-level commands for one tracker session.
pub struct CommandDispatcher<T: BleTransport, W: WifiTransport> {
    session: Arc<Session<T>>,
    http: DeviceHttpClient,
    bulk: Arc<BulkCoordinator<W>>,
}

impl<T, W> CommandDispatcher<T, W>
where
    T: BleTransport + Send + Sync + 'static,
    W: WifiTransport + Send + Sync + 'static,
{
    /// Create a dispatcher over an existing session and bulk coordinator.
    pub fn new(
        session: Arc<Session<T>>,
        http: DeviceHttpClient,
        bulk: Arc<BulkCoordinator<W>>,
    ) -> Self {
        Self {
            session,
            http,
            bulk,
        }
    }

    /// The session this dispatcher drives.
    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// The bulk coordinator this dispatcher triggers.
    pub fn bulk(&self) -> &Arc<BulkCoordinator<W>> {
        &self.bulk
    }

    /// Fetch a fresh health snapshot from the tracker.
    ///
    /// The previous snapshot is stale the moment this is called; callers
    /// replace it atomically with the returned value.
    pub async fn fetch_health(&self) -> Result<DeviceHealth> {
        self.http.health().await
    }

    /// Start a recording session on the tracker.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn start_session(&self) -> Result<()> {
        self.ensure_reachable().await?;
        self.http.start_recording().await
    }

    /// Stop the current recording session.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn stop_session(&self) -> Result<()> {
        self.ensure_reachable().await?;
        self.http.stop_recording().await
    }

    /// Re-zero the tracker's inertial sensor.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn reset_sensor(&self) -> Result<()> {
        self.ensure_reachable().await?;
        self.http.reset_imu().await
    }

    /// Tell the tracker to bring up its HTTP server and start the bulk
    /// transfer.
    ///
    /// Returns as soon as the BLE write is acknowledged; the transfer
    /// itself proceeds in a background task whose handle is returned.
    /// Write failures do not alter the connection state.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn enable_bulk_mode(
        &self,
    ) -> Result<tokio::task::JoinHandle<Result<BulkTransferResult>>> {
        self.ensure_ble_active()?;
        if self.bulk.is_in_flight() {
            return Err(Error::busy("bulk transfer"));
        }

        let frame = CommandFrame::new(Opcode::ServerOn).encode();
        self.session.transport().write_command(&frame).await?;
        info!("Bulk mode enabled, starting transfer");

        let bulk = Arc::clone(&self.bulk);
        Ok(tokio::spawn(async move { bulk.run().await }))
    }

    /// Tell the tracker to shut down its HTTP server and access point.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn disable_bulk_mode(&self) -> Result<()> {
        self.ensure_ble_active()?;
        let frame = CommandFrame::new(Opcode::ServerOff).encode();
        self.session.transport().write_command(&frame).await?;
        info!("Bulk mode disabled");
        Ok(())
    }

    /// Session and sensor commands need the device's HTTP server to answer;
    /// fail fast without issuing the real request otherwise.
    async fn ensure_reachable(&self) -> Result<()> {
        if self.http.is_reachable().await {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn ensure_ble_active(&self) -> Result<()> {
        if self.session.state().is_ble_active() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::BulkOptions;
    use crate::events::EventDispatcher;
    use crate::mock::{MockBle, MockWifi};
    use std::time::Duration;

    fn dispatcher(
        ble: Arc<MockBle>,
        wifi: Arc<MockWifi>,
    ) -> CommandDispatcher<MockBle, MockWifi> {
        let session = Arc::new(Session::new(ble));
        // Unroutable local port so reachability checks fail fast offline
        let http = DeviceHttpClient::with_timeout("http://127.0.0.1:1", Duration::from_millis(250))
            .unwrap();
        let options = BulkOptions::new()
            .base_url("http://127.0.0.1:1")
            .settle_delay(Duration::from_millis(10));
        let bulk = Arc::new(BulkCoordinator::new(
            wifi,
            options,
            EventDispatcher::default(),
        ));
        CommandDispatcher::new(session, http, bulk)
    }

    #[tokio::test]
    async fn test_bulk_mode_requires_active_link() {
        let dispatcher = dispatcher(Arc::new(MockBle::new()), Arc::new(MockWifi::new()));
        let err = dispatcher.enable_bulk_mode().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        let err = dispatcher.disable_bulk_mode().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_enable_bulk_mode_writes_server_on_frame() {
        let ble = Arc::new(MockBle::new());
        let dispatcher = dispatcher(Arc::clone(&ble), Arc::new(MockWifi::new()));

        dispatcher.session().connect("AA:BB").await.unwrap();
        let handle = dispatcher.enable_bulk_mode().await.unwrap();

        let writes = ble.recorded_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0][0], 1);
        assert!(writes[0][1..].iter().all(|&b| b == 0));

        // Transfer fails against the unroutable address, but terminates
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_disable_bulk_mode_writes_server_off_frame() {
        let ble = Arc::new(MockBle::new());
        let dispatcher = dispatcher(Arc::clone(&ble), Arc::new(MockWifi::new()));

        dispatcher.session().connect("AA:BB").await.unwrap();
        dispatcher.disable_bulk_mode().await.unwrap();

        let writes = ble.recorded_writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_write_failure_does_not_alter_state() {
        let ble = Arc::new(MockBle::new().fail_writes());
        let dispatcher = dispatcher(Arc::clone(&ble), Arc::new(MockWifi::new()));

        dispatcher.session().connect("AA:BB").await.unwrap();
        let state_before = dispatcher.session().state();

        let err = dispatcher.disable_bulk_mode().await.unwrap_err();
        assert!(matches!(err, Error::WriteFailed { .. }));
        assert_eq!(dispatcher.session().state(), state_before);
    }

    #[tokio::test]
    async fn test_session_commands_fail_fast_when_unreachable() {
        let dispatcher = dispatcher(Arc::new(MockBle::new()), Arc::new(MockWifi::new()));
        assert!(matches!(
            dispatcher.start_session().await.unwrap_err(),
            Error::NotConnected
        ));
        assert!(matches!(
            dispatcher.stop_session().await.unwrap_err(),
            Error::NotConnected
        ));
        assert!(matches!(
            dispatcher.reset_sensor().await.unwrap_err(),
            Error::NotConnected
        ));
    }
}
