//! Error types for the telemetry link layer, split by concern rather than
//! collapsed into one enum: framing, codec, manifest/config, and transport
//! errors are handled differently by callers, so they get distinct types.

use thiserror::Error;

/// Errors raised while serialising or parsing a wire packet (`LEN|SEQ|PAYLOAD`).
///
/// These are always local: the caller logs an `rx_parse_fail` event and
/// discards the frame, the loop continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Frame shorter than the 2-byte `LEN|SEQ` header.
    #[error("frame must be at least 2 bytes, got {0}")]
    TooShort(usize),

    /// `max_payload_bytes` configured outside `1..=255`.
    #[error("max_payload_bytes must be 1..=255, got {0}")]
    InvalidLimit(usize),

    /// Declared or actual payload length exceeds the configured cap.
    #[error("payload length {length} exceeds max_payload_bytes {limit}")]
    PayloadTooLarge { length: usize, limit: usize },

    /// The length byte disagrees with the number of bytes actually present.
    #[error("frame length {frame_len} does not match LEN {declared}")]
    LengthMismatch { frame_len: usize, declared: usize },
}

/// Errors raised by a codec's `encode`/`decode`.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidPayload(String),

    #[error("codec not implemented: {0}")]
    NotImplemented(String),

    #[error("unknown codec id: {0}")]
    UnknownCodec(String),

    #[error("bam artifact error: {0}")]
    Artifact(String),

    #[error("I/O error loading codec artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error loading codec artifact: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that are fatal before a node starts: bad `RunSpec`, bad manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as {format}: {source}")]
    Parse {
        path: String,
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Manifest/codec identity mismatches. Always fatal at run start.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest codec_id {manifest} does not match runspec codec.id {expected}")]
    CodecIdMismatch { manifest: String, expected: String },

    #[error("manifest codec_version {manifest} does not match runspec codec.version {expected}")]
    CodecVersionMismatch { manifest: String, expected: String },

    #[error("manifest payload_schema_hash {manifest} does not match codec schema hash {actual}")]
    SchemaHashMismatch { manifest: String, actual: String },

    #[error("norm_params_hash {manifest} does not match hash of norm file {actual}")]
    NormHashMismatch { manifest: String, actual: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Transport-level errors. `send` propagates these; `recv` timeouts are
/// normal and represented as `Ok(None)`, never an error.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio send failed: {0}")]
    SendFailed(String),

    #[error("radio closed")]
    Closed,
}
