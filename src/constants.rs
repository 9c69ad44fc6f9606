//! Link-layer constants.
//!
//! These are not configuration, they are the protocol.

/// Largest payload a frame may carry: the `LEN` byte is a `u8`.
pub const MAX_PAYLOAD_BYTES: usize = 255;

/// Wire header size: `LEN(1B) | SEQ(1B)`.
pub const FRAME_HEADER_BYTES: usize = 2;

/// Default ACK-timeout safety margin in milliseconds (§4.1).
pub const DEFAULT_ACK_MARGIN_MS: u32 = 40;

/// Conservative default ACK frame size (1-byte payload + 2-byte header) used
/// when estimating the auto ACK timeout.
pub const ACK_FRAME_BYTES: u32 = 3;

/// `sensor12_packed` fixed channel count.
pub const SENSOR_DIMS: usize = 12;

/// Bytes per `sensor12_packed` step: 3×f32 (GPS) + 9×i16 (accel/gyro/rpy).
pub const SENSOR12_PACKED_STEP_BYTES: usize = 4 * 3 + 2 * 9;

/// Symbol period threshold (seconds) above which low-data-rate optimisation
/// auto-enables for SF7-SF12 (§4.1).
pub const LDRO_AUTO_THRESHOLD_SEC: f64 = 0.01638;

/// Default low-data-rate-optimisation delta must stay below this for BAM
/// refinement cycles to be numerically stable (§4.3).
pub const BAM_MAX_DELTA_WITH_CYCLES: f64 = 0.5;
