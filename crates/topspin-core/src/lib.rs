//! BLE and WiFi connectivity core for Topspin swing trackers.
//!
//! This crate drives the phone side of a Topspin tracker: discovery and
//! connection over Bluetooth Low Energy, real-time swing-sample streaming,
//! and the BLE-to-WiFi hand-off used to pull large shot-history downloads
//! off the device.
//!
//! # Features
//!
//! - **Device discovery**: bounded BLE scans for nearby trackers
//! - **Connection state machine**: one owned state, snapshot reads, events
//! - **Swing streaming**: 4-byte little-endian samples over notifications
//! - **Recording control**: start/stop sessions and IMU reset over HTTP
//! - **Bulk transfer**: join the tracker's AP and fetch the shot CSV
//! - **Mock transports**: full test coverage without real radios
//!
//! # Platform Differences
//!
//! Device identification varies by platform due to differences in BLE
//! implementations:
//!
//! - **macOS**: devices are identified by a CoreBluetooth UUID, stable per
//!   device per machine but not across machines.
//! - **Linux/Windows**: devices are identified by their Bluetooth MAC
//!   address (e.g., `AA:BB:CC:DD:EE:FF`).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use topspin_core::{BleLink, Session, ScanOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(Arc::new(BleLink::new()));
//!
//!     let devices = session.scan(ScanOptions::default()).await?;
//!     let tracker = devices.first().ok_or("no tracker in range")?;
//!
//!     session.connect(&tracker.id).await?;
//!     session.start_streaming().await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     println!("Swings so far: {:?}", session.samples().snapshot());
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod commands;
pub mod error;
pub mod events;
pub mod http;
pub mod link;
pub mod mock;
pub mod samples;
pub mod scan;
pub mod session;
pub mod traits;
pub mod wifi;

// Re-export types and uuid modules from topspin-types
pub use topspin_types::types;
pub use topspin_types::uuid;

// Core exports
pub use bulk::{BulkCoordinator, BulkOptions, BulkPhase, BulkTransferResult, SETTLE_DELAY};
pub use commands::CommandDispatcher;
pub use error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
pub use events::{
    DeviceEvent, DeviceId, DisconnectReason, EventDispatcher, EventReceiver, EventSender,
};
pub use http::DeviceHttpClient;
pub use link::{BleLink, ConnectionConfig};
pub use mock::{MockBle, MockWifi};
pub use samples::SampleLog;
pub use scan::{
    DiscoveredDevice, ScanOptions, scan_for_devices, scan_with_options, scan_with_retry,
};
pub use session::Session;
pub use traits::{BleTransport, NotificationHandler, WifiTransport};
pub use wifi::{SystemWifi, TRACKER_SSID};

// Re-export from topspin-types
pub use topspin_types::uuid as uuids;
pub use topspin_types::{
    CommandFrame, ConnectionState, DeviceHealth, Opcode, SdCardUsage, format_bytes,
};
