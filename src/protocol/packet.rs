//! Wire packet: `LEN(1B) | SEQ(1B) | PAYLOAD(LEN bytes)`.

use crate::error::PacketError;

/// A parsed or to-be-sent link-layer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub payload: Vec<u8>,
    pub seq: u8,
}

impl Packet {
    pub fn new(payload: Vec<u8>, seq: u8) -> Self {
        Self { payload, seq }
    }

    /// Serialises to `LEN|SEQ|PAYLOAD`. `max_payload_bytes` defaults to 255
    /// and must be `1..=255`; the payload must fit within it.
    pub fn to_bytes(&self, max_payload_bytes: Option<usize>) -> Result<Vec<u8>, PacketError> {
        let limit = max_payload_bytes.unwrap_or(255);
        if !(1..=255).contains(&limit) {
            return Err(PacketError::InvalidLimit(limit));
        }
        if self.payload.len() > limit {
            return Err(PacketError::PayloadTooLarge {
                length: self.payload.len(),
                limit,
            });
        }
        let mut out = Vec::with_capacity(2 + self.payload.len());
        out.push(self.payload.len() as u8);
        out.push(self.seq);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parses a complete frame (no trailing bytes, no RSSI byte: that is
    /// handled one layer up by `uart_framing`).
    pub fn from_bytes(frame: &[u8], max_payload_bytes: Option<usize>) -> Result<Packet, PacketError> {
        let limit = max_payload_bytes.unwrap_or(255);
        if !(1..=255).contains(&limit) {
            return Err(PacketError::InvalidLimit(limit));
        }
        if frame.len() < 2 {
            return Err(PacketError::TooShort(frame.len()));
        }
        let declared = frame[0] as usize;
        if declared > limit {
            return Err(PacketError::PayloadTooLarge {
                length: declared,
                limit,
            });
        }
        if frame.len() != declared + 2 {
            return Err(PacketError::LengthMismatch {
                frame_len: frame.len(),
                declared,
            });
        }
        Ok(Packet {
            payload: frame[2..].to_vec(),
            seq: frame[1],
        })
    }
}
