//! Byte-stream resync layer sitting in front of `Packet` parsing.
//!
//! A radio driver hands us a raw byte stream (possibly with a trailing RSSI
//! byte per received frame). Garbage bytes can appear at any point; this
//! parser resyncs by dropping one byte at a time whenever the declared
//! length looks implausible, rather than discarding the whole buffer.

use crate::error::PacketError;

/// A frame recovered from the byte stream, with optional RSSI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUartFrame {
    pub frame: Vec<u8>,
    pub rssi_dbm: Option<i32>,
}

pub struct UartFrameParser {
    max_payload_bytes: usize,
    include_rssi: bool,
    buf: Vec<u8>,
}

impl UartFrameParser {
    pub fn new(max_payload_bytes: usize, include_rssi: bool) -> Result<Self, PacketError> {
        if !(1..=255).contains(&max_payload_bytes) {
            return Err(PacketError::InvalidLimit(max_payload_bytes));
        }
        Ok(Self {
            max_payload_bytes,
            include_rssi,
            buf: Vec::new(),
        })
    }

    /// Appends newly-received bytes to the internal buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Attempts to pop one complete frame from the buffer. Returns `None`
    /// when there isn't enough data yet; resyncs by dropping a byte when the
    /// declared length is implausible.
    pub fn pop(&mut self) -> Option<ParsedUartFrame> {
        loop {
            if self.buf.len() < 2 {
                return None;
            }
            let length = self.buf[0] as usize;
            if length > self.max_payload_bytes {
                self.buf.remove(0);
                continue;
            }
            let total_len = 2 + length + if self.include_rssi { 1 } else { 0 };
            if self.buf.len() < total_len {
                return None;
            }
            let rssi_dbm = if self.include_rssi {
                let byte = self.buf[total_len - 1] as i32;
                Some(byte - 256)
            } else {
                None
            };
            let frame: Vec<u8> = self.buf[..2 + length].to_vec();
            self.buf.drain(..total_len);
            return Some(ParsedUartFrame { frame, rssi_dbm });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_clean_frame() {
        let mut parser = UartFrameParser::new(255, false).unwrap();
        parser.feed(&[3, 7, 1, 2, 3]);
        let parsed = parser.pop().unwrap();
        assert_eq!(parsed.frame, vec![3, 7, 1, 2, 3]);
        assert_eq!(parsed.rssi_dbm, None);
        assert!(parser.pop().is_none());
    }

    #[test]
    fn returns_none_until_frame_is_complete() {
        let mut parser = UartFrameParser::new(255, false).unwrap();
        parser.feed(&[3, 7, 1]);
        assert!(parser.pop().is_none());
        parser.feed(&[2, 3]);
        assert!(parser.pop().is_some());
    }

    #[test]
    fn parses_rssi_byte_as_signed_offset() {
        let mut parser = UartFrameParser::new(255, true).unwrap();
        // rssi byte 200 -> 200 - 256 = -56 dBm
        parser.feed(&[2, 0, 9, 9, 200]);
        let parsed = parser.pop().unwrap();
        assert_eq!(parsed.rssi_dbm, Some(-56));
        assert_eq!(parsed.frame, vec![2, 0, 9, 9]);
    }

    #[test]
    fn resyncs_by_dropping_one_byte_on_garbage_length() {
        let mut parser = UartFrameParser::new(10, false).unwrap();
        // 250 is an implausible length (> max 10): drop it, then parse a
        // clean 2-byte-payload frame starting at the next byte.
        parser.feed(&[250, 2, 0, 1, 2]);
        let parsed = parser.pop().unwrap();
        assert_eq!(parsed.frame, vec![2, 0, 1, 2]);
    }

    #[test]
    fn handles_multiple_frames_back_to_back() {
        let mut parser = UartFrameParser::new(255, false).unwrap();
        parser.feed(&[1, 0, 0xaa]);
        parser.feed(&[1, 1, 0xbb]);
        let first = parser.pop().unwrap();
        let second = parser.pop().unwrap();
        assert_eq!(first.frame, vec![1, 0, 0xaa]);
        assert_eq!(second.frame, vec![1, 1, 0xbb]);
        assert!(parser.pop().is_none());
    }

    #[test]
    fn rejects_invalid_limit() {
        assert!(UartFrameParser::new(0, false).is_err());
        assert!(UartFrameParser::new(300, false).is_err());
    }
}
