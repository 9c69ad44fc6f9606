//! A reliable telemetry link layer over a framed, low-bandwidth radio.
//!
//! Three layers, bottom to top:
//!
//! - [`phy`] estimates time-on-air for a LoRa PHY profile.
//! - [`protocol`] frames and parses packets on top of a raw byte stream.
//! - [`codec`] turns a flattened sensor window into a wire payload, with a
//!   lossless baseline, lossy fixed-point baselines, and a learned latent
//!   codec.
//!
//! [`runtime`] wires those into a cooperative, `Clock`-driven TX/RX pipeline
//! with airtime-gated ARQ; [`radio`] supplies the mock transport used by
//! tests and the [`experiments`] tooling; [`config`] and [`sensing`] cover
//! everything needed to describe and feed a run.
//!
//! This crate has no binary target and does not talk to physical hardware:
//! a real radio driver is an external collaborator implementing
//! [`radio::Radio`].

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod experiments;
pub mod logging;
pub mod phy;
pub mod protocol;
pub mod radio;
pub mod runtime;
pub mod sensing;

pub use error::{CodecError, ConfigError, ManifestError, PacketError, RadioError};
