//! Event system for connection and transfer notifications.
//!
//! This module provides a broadcast-based event system for observing state
//! transitions, incoming swing samples, bulk-transfer progress, and errors
//! without polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use topspin_types::ConnectionState;

use crate::bulk::BulkPhase;

/// Device identifier for events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Unique identifier (peripheral ID or MAC address).
    pub id: String,
    /// Device name if known.
    pub name: Option<String>,
}

impl DeviceId {
    /// Create a new device ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Create a device ID with name.
    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// Events emitted by the connectivity core.
///
/// All events are serializable for logging, persistence, and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeviceEvent {
    /// Tracker was discovered during scanning.
    Discovered { device: DeviceId, rssi: Option<i16> },
    /// The connection state machine completed a transition.
    ///
    /// Exactly one event is emitted per transition, after the new state is
    /// observable through snapshots.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Disconnected from the tracker.
    Disconnected {
        device: DeviceId,
        reason: DisconnectReason,
    },
    /// A swing sample was ingested from a notification.
    Sample { device: DeviceId, count: u32 },
    /// A notification payload could not be decoded and was dropped.
    MalformedSample { device: DeviceId, len: usize },
    /// A bulk transfer moved to a new phase.
    BulkPhaseChanged { phase: BulkPhase },
    /// Error occurred during a device operation.
    Error { device: DeviceId, error: String },
}

/// Reason for disconnection.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Normal disconnection requested by the caller.
    UserRequested,
    /// Device went out of range.
    OutOfRange,
    /// Connection timed out.
    Timeout,
    /// Device was powered off.
    DevicePoweredOff,
    /// BLE error occurred.
    BleError(String),
    /// Unknown reason.
    Unknown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserRequested => write!(f, "requested by user"),
            Self::OutOfRange => write!(f, "device out of range"),
            Self::Timeout => write!(f, "connection timed out"),
            Self::DevicePoweredOff => write!(f, "device powered off"),
            Self::BleError(e) => write!(f, "BLE error: {}", e),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Sender for device events.
pub type EventSender = broadcast::Sender<DeviceEvent>;

/// Receiver for device events.
pub type EventReceiver = broadcast::Receiver<DeviceEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Create a default event channel with capacity 100.
pub fn default_event_channel() -> (EventSender, EventReceiver) {
    event_channel(100)
}

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: DeviceEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the sender for direct use.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatcher_delivers_to_subscribers() {
        let dispatcher = EventDispatcher::new(16);
        let mut rx = dispatcher.subscribe();

        dispatcher.send(DeviceEvent::Sample {
            device: DeviceId::new("AA:BB"),
            count: 12,
        });

        match rx.recv().await.unwrap() {
            DeviceEvent::Sample { count, .. } => assert_eq!(count, 12),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_send_without_receivers_does_not_panic() {
        let dispatcher = EventDispatcher::default();
        dispatcher.send(DeviceEvent::Error {
            device: DeviceId::new("AA:BB"),
            error: "boom".into(),
        });
        assert_eq!(dispatcher.receiver_count(), 0);
    }

    #[test]
    fn test_state_changed_serializes_tagged() {
        let event = DeviceEvent::StateChanged {
            from: ConnectionState::Idle,
            to: ConnectionState::Scanning,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("state_changed"));
        assert!(json.contains("scanning"));
    }
}
