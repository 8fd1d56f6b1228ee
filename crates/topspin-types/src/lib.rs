//! Platform-agnostic types for Topspin swing trackers.
//!
//! This crate provides the shared vocabulary used by topspin-core and any
//! other front end: connection states, wire frames, device health, and the
//! BLE UUID constants the tracker firmware advertises.
//!
//! # Features
//!
//! - Connection lifecycle states
//! - Control-frame encoding and swing-sample decoding
//! - Device health and SD-card usage structures
//! - UUID constants for BLE characteristics
//! - Error types for wire parsing
//!
//! # Example
//!
//! ```
//! use topspin_types::{CommandFrame, Opcode, FRAME_LEN};
//!
//! let frame = CommandFrame::new(Opcode::ServerOn).encode();
//! assert_eq!(frame.len(), FRAME_LEN);
//! assert_eq!(frame[0], 1);
//! ```

pub mod error;
pub mod fmt;
pub mod frame;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use fmt::format_bytes;
pub use frame::{CommandFrame, FRAME_LEN, Opcode, SAMPLE_LEN, decode_sample};
pub use types::{ConnectionState, DeviceHealth, SdCardUsage};
pub use uuid as uuids;
