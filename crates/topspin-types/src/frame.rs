//! Control-frame encoding and swing-sample decoding.
//!
//! The tracker's control characteristic accepts fixed-length 20-byte
//! frames: the first byte is the opcode, the remaining 19 bytes are
//! reserved and must be zero. Telemetry notifications carry one swing
//! count per notification as a little-endian `u32`.

use crate::error::{ParseError, ParseResult};

/// Length of every frame written to the control characteristic.
pub const FRAME_LEN: usize = 20;

/// Length of a swing-count notification payload.
pub const SAMPLE_LEN: usize = 4;

/// Opcodes understood by the tracker's control characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Stop the on-device HTTP server and tear down the access point.
    ServerOff = 0,
    /// Start the on-device HTTP server (tracker brings up its AP).
    ServerOn = 1,
}

impl Opcode {
    /// Decode an opcode from its wire byte.
    pub fn from_byte(byte: u8) -> ParseResult<Self> {
        match byte {
            0 => Ok(Opcode::ServerOff),
            1 => Ok(Opcode::ServerOn),
            other => Err(ParseError::InvalidValue(format!("unknown opcode: {other}"))),
        }
    }
}

/// A fixed-length command frame for the control characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: Opcode,
}

impl CommandFrame {
    /// Build a frame carrying the given opcode.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode }
    }

    /// The frame's opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Encode to the 20-byte wire form: opcode byte followed by zeros.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0] = self.opcode as u8;
        buf
    }

    /// Decode a frame from its wire form.
    ///
    /// Rejects payloads that are not exactly [`FRAME_LEN`] bytes or whose
    /// reserved tail is non-zero.
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        if data.len() != FRAME_LEN {
            return Err(ParseError::InvalidLength {
                expected: FRAME_LEN,
                actual: data.len(),
            });
        }
        if data[1..].iter().any(|&b| b != 0) {
            return Err(ParseError::InvalidValue(
                "reserved frame bytes must be zero".into(),
            ));
        }
        Ok(Self {
            opcode: Opcode::from_byte(data[0])?,
        })
    }
}

/// Decode a swing-count sample from a notification payload.
///
/// The payload must be exactly 4 bytes, interpreted as a little-endian
/// `u32` cumulative swing count.
pub fn decode_sample(data: &[u8]) -> ParseResult<u32> {
    let bytes: [u8; SAMPLE_LEN] = data.try_into().map_err(|_| ParseError::InvalidLength {
        expected: SAMPLE_LEN,
        actual: data.len(),
    })?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_on_encodes_opcode_then_zeros() {
        let frame = CommandFrame::new(Opcode::ServerOn).encode();
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(frame[0], 1);
        assert!(frame[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_server_off_encodes_all_zeros() {
        let frame = CommandFrame::new(Opcode::ServerOff).encode();
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_round_trip() {
        let wire = CommandFrame::new(Opcode::ServerOn).encode();
        let frame = CommandFrame::decode(&wire).unwrap();
        assert_eq!(frame.opcode(), Opcode::ServerOn);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let err = CommandFrame::decode(&[1u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidLength { expected: FRAME_LEN, actual: 4 }
        ));
    }

    #[test]
    fn test_decode_rejects_dirty_reserved_bytes() {
        let mut wire = [0u8; FRAME_LEN];
        wire[0] = 1;
        wire[7] = 0xFF;
        assert!(CommandFrame::decode(&wire).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_opcode() {
        let mut wire = [0u8; FRAME_LEN];
        wire[0] = 9;
        assert!(CommandFrame::decode(&wire).is_err());
    }

    #[test]
    fn test_decode_sample_little_endian() {
        assert_eq!(decode_sample(&[0x2A, 0x00, 0x00, 0x00]).unwrap(), 42);
        assert_eq!(decode_sample(&[0x00, 0x01, 0x00, 0x00]).unwrap(), 256);
        assert_eq!(decode_sample(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), u32::MAX);
    }

    #[test]
    fn test_decode_sample_rejects_wrong_length() {
        assert!(decode_sample(&[1, 2, 3]).is_err());
        assert!(decode_sample(&[1, 2, 3, 4, 5]).is_err());
        assert!(decode_sample(&[]).is_err());
    }
}
