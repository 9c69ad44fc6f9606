//! Cooperative single-threaded runtime driving the TX/RX state machines.
//!
//! Deliberately not `async`/tokio: physical UART I/O is an external
//! collaborator, so the whole loop is a plain `process_once()` stepped by
//! a `Clock`.

pub mod clock;
pub mod controller;
pub mod logging;
pub mod rx_node;
pub mod scheduler;
pub mod tx_node;

pub use clock::{Clock, FakeClock, RealClock};
pub use controller::run_pair;
pub use logging::JsonlLogger;
pub use rx_node::{RxNode, TruthProvider};
pub use scheduler::{Inflight, SchedulerMetrics, TxGate};
pub use tx_node::{NormParams, Preprocessor, TxNode, WindowBuilder};
