//! Radio transport contract. Production code implements `Radio` against a
//! real driver; this crate ships only the mock used for Phase 0/1
//! experiments and tests.

pub mod mock;

use crate::error::RadioError;

/// Minimal radio contract: send raw bytes, receive raw bytes with a
/// timeout, close.
pub trait Radio {
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Returns `Ok(None)` on a normal timeout, never an error.
    fn recv(&mut self, timeout_ms: u64) -> Result<Option<Vec<u8>>, RadioError>;

    fn close(&mut self);
}

/// Optional capability: radios that can report the RSSI of the last
/// received frame implement this alongside `Radio`.
pub trait RxRssi {
    fn last_rx_rssi_dbm(&self) -> Option<i32>;
}
