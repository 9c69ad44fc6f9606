//! Builds a boxed `Codec` from a `CodecSpec`.
//!
//! Dispatches `raw`, `zlib`, and `bam_placeholder` only: full BAM
//! construction needs a model directory and goes through
//! `BamCodec::from_manifest` directly, not this factory.

use crate::codec::bam_placeholder::BamPlaceholderCodec;
use crate::codec::raw::RawCodec;
use crate::codec::sensor12_packed::Sensor12PackedCodec;
use crate::codec::sensor12_packed_truncate::Sensor12PackedTruncateCodec;
use crate::codec::zlib_codec::ZlibCodec;
use crate::codec::Codec;
use crate::config::runspec::CodecSpec;
use crate::error::CodecError;

fn param_f64(spec: &CodecSpec, key: &str, default: f64) -> f64 {
    spec.params
        .get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

fn param_usize(spec: &CodecSpec, key: &str) -> Option<usize> {
    spec.params.get(key).and_then(|v| v.as_u64()).map(|v| v as usize)
}

/// Constructs a codec for every id this crate can build without external
/// model artifacts. `bam` proper is built via `BamCodec::from_manifest`.
pub fn create_codec(spec: &CodecSpec) -> Result<Box<dyn Codec + Send + Sync>, CodecError> {
    match spec.id.to_lowercase().as_str() {
        "raw" => {
            let scale = param_f64(spec, "scale", 32767.0);
            Ok(Box::new(RawCodec::new(scale)))
        }
        "sensor12_packed" => {
            let accel = param_f64(spec, "accel_scale", 1000.0);
            let gyro = param_f64(spec, "gyro_scale", 10.0);
            let rpy = param_f64(spec, "rpy_scale", 10.0);
            Ok(Box::new(Sensor12PackedCodec::new(accel, gyro, rpy)))
        }
        "sensor12_packed_truncate" => {
            let payload_bytes = param_usize(spec, "payload_bytes").ok_or_else(|| {
                CodecError::InvalidInput("sensor12_packed_truncate requires payload_bytes".into())
            })?;
            let window_w = param_usize(spec, "window_W").unwrap_or(1);
            let accel = param_f64(spec, "accel_scale", 1000.0);
            let gyro = param_f64(spec, "gyro_scale", 10.0);
            let rpy = param_f64(spec, "rpy_scale", 10.0);
            Ok(Box::new(Sensor12PackedTruncateCodec::new(
                payload_bytes,
                window_w,
                accel,
                gyro,
                rpy,
            )))
        }
        "zlib" => {
            let level = param_usize(spec, "level").unwrap_or(6) as u32;
            Ok(Box::new(ZlibCodec::new(Box::new(RawCodec::default()), level)))
        }
        "bam_placeholder" => {
            let reason = spec
                .params
                .get("reason")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Ok(Box::new(BamPlaceholderCodec::new(reason)))
        }
        other => Err(CodecError::UnknownCodec(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(id: &str) -> CodecSpec {
        CodecSpec {
            id: id.to_string(),
            version: "1".to_string(),
            params: HashMap::new(),
        }
    }

    #[test]
    fn builds_raw_codec() {
        let codec = create_codec(&spec("raw")).unwrap();
        assert_eq!(codec.codec_id(), "raw");
    }

    #[test]
    fn builds_zlib_codec() {
        let codec = create_codec(&spec("zlib")).unwrap();
        assert_eq!(codec.codec_id(), "zlib");
    }

    #[test]
    fn rejects_unknown_codec_id() {
        assert!(create_codec(&spec("not_a_codec")).is_err());
    }

    #[test]
    fn sensor12_packed_truncate_requires_payload_bytes() {
        assert!(create_codec(&spec("sensor12_packed_truncate")).is_err());
    }
}
