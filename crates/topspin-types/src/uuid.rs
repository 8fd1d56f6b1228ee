//! Bluetooth UUIDs for the Topspin tracker.
//!
//! The tracker exposes a single custom GATT service with one characteristic
//! that is used for both 20-byte command writes and unsolicited notifications
//! carrying 4-byte little-endian swing samples.

use uuid::{uuid, Uuid};

/// Topspin tracker custom service UUID.
pub const TRACKER_SERVICE: Uuid = uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// Control/telemetry characteristic.
///
/// Written with [`CommandFrame`](crate::frame::CommandFrame) payloads and
/// subscribed to for swing sample notifications.
pub const TRACKER_CONTROL: Uuid = uuid!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

// --- Standard BLE Service UUIDs ---

/// Generic Access Profile (GAP) service.
pub const GAP_SERVICE: Uuid = uuid!("00001800-0000-1000-8000-00805f9b34fb");

/// Device name characteristic.
pub const DEVICE_NAME: Uuid = uuid!("00002a00-0000-1000-8000-00805f9b34fb");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_service_uuid() {
        let expected = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";
        assert_eq!(TRACKER_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_tracker_control_uuid() {
        let expected = "beb5483e-36e1-4688-b7f5-ea07361b26a8";
        assert_eq!(TRACKER_CONTROL.to_string(), expected);
    }
}
