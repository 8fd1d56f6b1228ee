//! Connection state machine for a tracker session.
//!
//! [`Session`] owns the single [`ConnectionState`] for the application and
//! is the only component that mutates it. Everything else reads snapshots
//! and requests transitions through the public operations here.
//!
//! Transition table:
//!
//! ```text
//! Idle ──scan()──▶ Scanning ──window expiry──▶ Idle
//! Idle ──connect()──▶ Connecting ──▶ Connected │ Error(reason)
//! Connected ──start_streaming()──▶ Streaming
//! any ──spontaneous drop / disconnect()──▶ Disconnected
//! Error ──acknowledge_error()──▶ Idle
//! ```
//!
//! `Disconnected` is equivalent to `Idle` for the purpose of starting a new
//! scan or connection, so no timer-driven `Disconnected -> Idle` hop exists;
//! the next operation performs it.
//!
//! Only one transition may be in flight at a time. A second request while
//! one is pending is rejected with [`Error::Busy`], never queued, so
//! connect/disconnect races cannot overlap.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use topspin_types::ConnectionState;

use crate::error::{Error, Result};
use crate::events::{DeviceEvent, DeviceId, DisconnectReason, EventDispatcher, EventReceiver};
use crate::samples::SampleLog;
use crate::scan::{DiscoveredDevice, ScanOptions};
use crate::traits::BleTransport;

/// Shared pieces the spontaneous-disconnect handler needs.
struct Shared {
    state: std::sync::Mutex<ConnectionState>,
    device: std::sync::Mutex<Option<DeviceId>>,
    events: EventDispatcher,
}

impl Shared {
    fn snapshot(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(ConnectionState::Idle)
    }

    /// Swap in a new state and emit exactly one StateChanged event.
    fn set_state(&self, to: ConnectionState) {
        let from = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            std::mem::replace(&mut *state, to.clone())
        };
        if from != to {
            debug!("State: {} -> {}", from, to);
            self.events.send(DeviceEvent::StateChanged { from, to });
        }
    }

    fn device_id(&self) -> DeviceId {
        self.device
            .lock()
            .ok()
            .and_then(|d| d.clone())
            .unwrap_or_else(|| DeviceId::new("unknown"))
    }

    /// Force `Disconnected` after a spontaneous transport drop.
    ///
    /// Idempotent: repeated drop signals for the same session are no-ops.
    /// Returns whether this signal actually transitioned the machine.
    fn on_spontaneous_disconnect(&self) -> bool {
        let active = {
            let Ok(state) = self.state.lock() else {
                return false;
            };
            matches!(
                *state,
                ConnectionState::Connecting
                    | ConnectionState::Connected
                    | ConnectionState::Streaming
            )
        };
        if !active {
            debug!("Ignoring stale disconnect signal");
            return false;
        }

        warn!("Link dropped spontaneously");
        let device = self.device_id();
        if let Ok(mut handle) = self.device.lock() {
            *handle = None;
        }
        self.set_state(ConnectionState::Disconnected);
        self.events.send(DeviceEvent::Disconnected {
            device,
            reason: DisconnectReason::Unknown,
        });
        true
    }
}

/// A tracker session: one state machine, one sample log, one BLE link.
pub struct Session<T: BleTransport> {
    ble: Arc<T>,
    shared: Arc<Shared>,
    samples: Arc<SampleLog>,
    /// Held for the duration of each transition; try_lock failure means a
    /// transition is already in flight.
    transition: AsyncMutex<()>,
}

impl<T: BleTransport + 'static> Session<T> {
    /// Create a session over the given BLE transport.
    pub fn new(ble: Arc<T>) -> Self {
        Self::with_events(ble, EventDispatcher::default())
    }

    /// Create a session with a caller-provided event dispatcher.
    pub fn with_events(ble: Arc<T>, events: EventDispatcher) -> Self {
        let shared = Arc::new(Shared {
            state: std::sync::Mutex::new(ConnectionState::Idle),
            device: std::sync::Mutex::new(None),
            events,
        });

        let handler_shared = Arc::clone(&shared);
        let handler_ble = Arc::clone(&ble);
        ble.on_disconnect(Box::new(move || {
            if handler_shared.on_spontaneous_disconnect() {
                // The transport's link bookkeeping outlives the radio link;
                // it must be cleared or the next connect is rejected as busy.
                let ble = Arc::clone(&handler_ble);
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        if let Err(e) = ble.disconnect().await {
                            debug!("Post-drop link cleanup failed: {}", e);
                        }
                    });
                }
            }
        }));

        Self {
            ble,
            shared,
            samples: Arc::new(SampleLog::new()),
            transition: AsyncMutex::new(()),
        }
    }

    /// Snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.snapshot()
    }

    /// The swing sample log for the current session.
    ///
    /// Samples survive a disconnect and are cleared when the next
    /// connection attempt begins.
    pub fn samples(&self) -> &SampleLog {
        &self.samples
    }

    /// Subscribe to session events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// The underlying BLE transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.ble
    }

    /// Identifier of the connected tracker, if any.
    pub fn device(&self) -> Option<DeviceId> {
        self.shared.device.lock().ok().and_then(|d| d.clone())
    }

    fn begin_transition(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.transition
            .try_lock()
            .map_err(|_| Error::busy("state transition"))
    }

    /// Run a bounded discovery scan.
    ///
    /// The machine is `Scanning` for the duration of the window and returns
    /// to `Idle` when the window expires, regardless of results.
    #[tracing::instrument(level = "info", skip(self, options))]
    pub async fn scan(&self, options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
        let _guard = self.begin_transition()?;
        self.require_idle()?;

        self.shared.set_state(ConnectionState::Scanning);
        let result = self.ble.scan(options).await;
        self.shared.set_state(ConnectionState::Idle);

        let devices = result?;
        for device in &devices {
            self.shared.events.send(DeviceEvent::Discovered {
                device: match &device.name {
                    Some(name) => DeviceId::with_name(&device.id, name),
                    None => DeviceId::new(&device.id),
                },
                rssi: device.rssi,
            });
        }
        Ok(devices)
    }

    /// Connect to a discovered tracker.
    ///
    /// Starting a new connection clears the previous session's samples.
    /// On failure the machine lands in `Error` and stays there until
    /// [`acknowledge_error`](Self::acknowledge_error).
    #[tracing::instrument(level = "info", skip(self), fields(device_id = %device_id))]
    pub async fn connect(&self, device_id: &str) -> Result<()> {
        let _guard = self.begin_transition()?;
        self.require_idle()?;

        self.samples.clear();
        if let Ok(mut handle) = self.shared.device.lock() {
            *handle = Some(DeviceId::new(device_id));
        }

        self.shared.set_state(ConnectionState::Connecting);
        match self.ble.connect(device_id).await {
            Ok(()) => {
                info!("Connected to {}", device_id);
                self.shared.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                if let Ok(mut handle) = self.shared.device.lock() {
                    *handle = None;
                }
                self.shared.set_state(ConnectionState::Error {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Subscribe to swing notifications and enter `Streaming`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn start_streaming(&self) -> Result<()> {
        let _guard = self.begin_transition()?;
        if self.state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        let samples = Arc::clone(&self.samples);
        let shared = Arc::clone(&self.shared);
        self.ble
            .subscribe(Box::new(move |payload| {
                // Buffered notifications can still be delivered after a
                // drop; the log only grows while the machine is streaming.
                if shared.snapshot() != ConnectionState::Streaming {
                    debug!("Ignoring notification outside streaming");
                    return;
                }
                let device = shared.device_id();
                match samples.ingest(payload) {
                    Some(count) => shared.events.send(DeviceEvent::Sample { device, count }),
                    None => shared.events.send(DeviceEvent::MalformedSample {
                        device,
                        len: payload.len(),
                    }),
                }
            }))
            .await?;

        self.shared.set_state(ConnectionState::Streaming);
        Ok(())
    }

    /// Tear down the link.
    ///
    /// Idempotent: disconnecting while already disconnected (or never
    /// connected) is a no-op. Samples are preserved until the next
    /// connection attempt.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        let _guard = self.begin_transition()?;

        if !self.state().is_ble_active() {
            debug!("Disconnect requested but no link is up");
            return Ok(());
        }

        let device = self.shared.device_id();
        self.ble.disconnect().await?;
        if let Ok(mut handle) = self.shared.device.lock() {
            *handle = None;
        }
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.events.send(DeviceEvent::Disconnected {
            device,
            reason: DisconnectReason::UserRequested,
        });
        Ok(())
    }

    /// Acknowledge a failed transition and return the machine to `Idle`.
    pub fn acknowledge_error(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Error { .. } => {
                self.shared.set_state(ConnectionState::Idle);
                Ok(())
            }
            other => Err(Error::InvalidData(format!(
                "no error to acknowledge in state '{}'",
                other
            ))),
        }
    }

    fn require_idle(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Idle | ConnectionState::Disconnected => Ok(()),
            ConnectionState::Error { reason } => Err(Error::InvalidData(format!(
                "unacknowledged error: {}",
                reason
            ))),
            other => Err(Error::busy(other.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBle;

    fn session() -> Session<MockBle> {
        Session::new(Arc::new(MockBle::new()))
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let session = session();
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(session.samples().is_empty());
    }

    #[tokio::test]
    async fn test_connect_then_stream() {
        let session = session();
        let devices = session.scan(ScanOptions::default()).await.unwrap();
        assert_eq!(session.state(), ConnectionState::Idle);

        session.connect(&devices[0].id).await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);

        session.start_streaming().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Streaming);
    }

    #[tokio::test]
    async fn test_streaming_requires_connection() {
        let session = session();
        let err = session.start_streaming().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_failure_lands_in_error_until_acknowledged() {
        let ble = Arc::new(MockBle::new().fail_connects());
        let session = Session::new(ble);

        assert!(session.connect("AA:BB").await.is_err());
        assert!(matches!(session.state(), ConnectionState::Error { .. }));

        // Further transitions are rejected until the error is acknowledged
        assert!(session.connect("AA:BB").await.is_err());

        session.acknowledge_error().unwrap();
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_acknowledge_without_error_fails() {
        let session = session();
        assert!(session.acknowledge_error().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let session = session();
        session.connect("AA:BB").await.unwrap();
        session.disconnect().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // Second disconnect is a no-op, same terminal state
        session.disconnect().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_samples_survive_disconnect_until_new_connection() {
        let ble = Arc::new(MockBle::new());
        let session = Session::new(Arc::clone(&ble));

        session.connect("AA:BB").await.unwrap();
        session.start_streaming().await.unwrap();

        for count in [10u32, 20, 30] {
            ble.push_notification(&count.to_le_bytes());
        }
        assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);

        session.disconnect().await.unwrap();
        assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);

        // A fresh connection clears the previous session's samples
        session.connect("AA:BB").await.unwrap();
        assert!(session.samples().is_empty());
    }

    #[tokio::test]
    async fn test_spontaneous_disconnect_forces_disconnected() {
        let ble = Arc::new(MockBle::new());
        let session = Session::new(Arc::clone(&ble));

        session.connect("AA:BB").await.unwrap();
        session.start_streaming().await.unwrap();

        ble.inject_disconnect();
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // Repeated drop signals for the same session are no-ops
        ble.inject_disconnect();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_succeeds_after_spontaneous_drop() {
        let ble = Arc::new(MockBle::new());
        let session = Session::new(Arc::clone(&ble));

        session.connect("AA:BB").await.unwrap();
        session.start_streaming().await.unwrap();

        ble.inject_disconnect();
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // The drop handler clears the transport link in the background
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!ble.is_connected().await);

        session.connect("AA:BB").await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_late_notifications_after_drop_are_discarded() {
        let ble = Arc::new(MockBle::new());
        let session = Session::new(Arc::clone(&ble));

        session.connect("AA:BB").await.unwrap();
        session.start_streaming().await.unwrap();
        ble.push_notification(&10u32.to_le_bytes());

        ble.inject_disconnect();
        // A notification buffered in the stack is still delivered after
        // the drop, but must not land in the log
        ble.push_notification(&20u32.to_le_bytes());

        assert_eq!(session.samples().snapshot(), vec![10]);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_one_event_per_transition() {
        let session = session();
        let mut rx = session.subscribe_events();

        session.connect("AA:BB").await.unwrap();

        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DeviceEvent::StateChanged { from, to } = event {
                transitions.push((from, to));
            }
        }
        assert_eq!(
            transitions,
            vec![
                (ConnectionState::Idle, ConnectionState::Connecting),
                (ConnectionState::Connecting, ConnectionState::Connected),
            ]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let ble = Arc::new(MockBle::new());
        let session = Session::new(Arc::clone(&ble));

        let devices = session.scan(ScanOptions::default()).await.unwrap();
        assert!(!devices.is_empty());

        session.connect(&devices[0].id).await.unwrap();
        session.start_streaming().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Streaming);

        for count in [10u32, 20, 30] {
            ble.push_notification(&count.to_le_bytes());
        }
        assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);

        ble.inject_disconnect();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.samples().snapshot(), vec![10, 20, 30]);
    }
}
