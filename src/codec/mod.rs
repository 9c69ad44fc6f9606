//! Pluggable payload codecs.
//!
//! Every codec converts a flat `f64` window vector to/from a wire payload.
//! The `payload_schema()` string is the wire contract: TX and RX must agree
//! on it, and its SHA-256 hash is what `crate::config::artifacts` binds into
//! a run's manifest.

pub mod bam;
pub mod bam_artifacts;
pub mod bam_placeholder;
pub mod factory;
pub mod raw;
pub mod sensor12_packed;
pub mod sensor12_packed_truncate;
pub mod zlib_codec;

use sha2::{Digest, Sha256};

use crate::error::CodecError;

/// Common contract implemented by every codec.
pub trait Codec {
    fn codec_id(&self) -> &str;
    fn codec_version(&self) -> &str;

    /// Encodes one flattened window into a wire payload.
    fn encode(&self, window: &[f64]) -> Result<Vec<u8>, CodecError>;

    /// Decodes a wire payload back into a flattened window.
    fn decode(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError>;

    /// A stable descriptive string identifying the wire contract this codec
    /// produces/consumes (layout, scale, version). Two peers with matching
    /// `payload_schema()` strings can interoperate.
    fn payload_schema(&self) -> String;
}

/// SHA-256 hex digest of a codec's `payload_schema()` string.
pub fn payload_schema_hash(schema: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_hash_is_stable_and_distinguishes_schemas() {
        let a = payload_schema_hash("raw:int16:le:scale=32767");
        let b = payload_schema_hash("raw:int16:le:scale=32767");
        let c = payload_schema_hash("raw:int16:le:scale=1000");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
