//! Wire packet framing and byte-stream resync.

pub mod packet;
pub mod uart_framing;

pub use packet::Packet;
pub use uart_framing::{ParsedUartFrame, UartFrameParser};
