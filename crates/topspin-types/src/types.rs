//! Core types for Topspin tracker state and device info.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Lifecycle state of the BLE link to the tracker.
///
/// Exactly one instance is live per application session (single active
/// device). Transitions are driven only by the connection state machine in
/// topspin-core; every other component reads snapshots.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new states
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "state", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ConnectionState {
    /// No link, no scan in progress.
    Idle,
    /// A bounded discovery scan is running.
    Scanning,
    /// A connect attempt to a selected device is in flight.
    Connecting,
    /// Link established, telemetry subscription not yet active.
    Connected,
    /// Link established and swing notifications are being ingested.
    Streaming,
    /// The link was torn down (caller-initiated or spontaneous).
    Disconnected,
    /// A transition failed; the caller must acknowledge to return to `Idle`.
    Error {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl ConnectionState {
    /// Whether an active BLE link exists (connected or streaming).
    #[must_use]
    pub fn is_ble_active(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Streaming)
    }

    /// Short state name for event payloads and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error { .. } => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Error { reason } => write!(f, "error ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// SD-card usage reported by the tracker's health endpoint.
///
/// The firmware reports usage as a single `"<used>/<total>"` string with
/// both sides in decimal bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SdCardUsage {
    /// Bytes in use.
    pub used: u64,
    /// Total card capacity in bytes.
    pub total: u64,
}

impl SdCardUsage {
    /// Parse the firmware's `"<used>/<total>"` string.
    ///
    /// # Examples
    ///
    /// ```
    /// use topspin_types::SdCardUsage;
    ///
    /// let usage = SdCardUsage::parse("1572864/31914983424").unwrap();
    /// assert_eq!(usage.used, 1_572_864);
    /// assert_eq!(usage.total, 31_914_983_424);
    /// ```
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (used, total) = s
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidValue(format!("missing '/' in sd_card: {s:?}")))?;
        let used = used
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidValue(format!("bad sd_card used bytes: {used:?}")))?;
        let total = total
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidValue(format!("bad sd_card total bytes: {total:?}")))?;
        Ok(Self { used, total })
    }
}

impl fmt::Display for SdCardUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}",
            crate::fmt::format_bytes(self.used),
            crate::fmt::format_bytes(self.total)
        )
    }
}

/// Snapshot of the tracker's health endpoint.
///
/// Always treated as stale once a new fetch begins; replaced atomically on
/// response, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceHealth {
    /// Firmware version string.
    pub version: String,
    /// Battery percentage (0-100).
    pub battery: u8,
    /// SD-card usage, if the card is present.
    pub sd_card: Option<SdCardUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Idle.name(), "idle");
        assert_eq!(ConnectionState::Streaming.name(), "streaming");
        assert_eq!(
            ConnectionState::Error {
                reason: "x".into()
            }
            .name(),
            "error"
        );
    }

    #[test]
    fn test_is_ble_active() {
        assert!(ConnectionState::Connected.is_ble_active());
        assert!(ConnectionState::Streaming.is_ble_active());
        assert!(!ConnectionState::Idle.is_ble_active());
        assert!(!ConnectionState::Disconnected.is_ble_active());
    }

    #[test]
    fn test_state_display_includes_reason() {
        let state = ConnectionState::Error {
            reason: "connect timed out".into(),
        };
        assert_eq!(state.to_string(), "error (connect timed out)");
    }

    #[test]
    fn test_sd_card_parse_valid() {
        let usage = SdCardUsage::parse("28800000000/59500000000").unwrap();
        assert_eq!(usage.used, 28_800_000_000);
        assert_eq!(usage.total, 59_500_000_000);
    }

    #[test]
    fn test_sd_card_parse_rejects_missing_slash() {
        assert!(SdCardUsage::parse("12345").is_err());
    }

    #[test]
    fn test_sd_card_parse_rejects_non_decimal() {
        assert!(SdCardUsage::parse("abc/123").is_err());
        assert!(SdCardUsage::parse("123/").is_err());
    }

    #[test]
    fn test_sd_card_display_uses_binary_units() {
        let usage = SdCardUsage { used: 1_572_864, total: 1_073_741_824 };
        assert_eq!(usage.to_string(), "1.50 MB / 1.00 GB");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_connection_state_serializes_tagged() {
        let json = serde_json::to_string(&ConnectionState::Scanning).unwrap();
        assert!(json.contains("scanning"));
    }
}
