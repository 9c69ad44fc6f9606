//! Baseline codec: clamp each sample to `[-1, 1]`, quantize to `i16`, pack
//! little-endian.

use crate::codec::Codec;
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCodec {
    scale: f64,
}

impl RawCodec {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Default for RawCodec {
    fn default() -> Self {
        Self { scale: 32767.0 }
    }
}

impl Codec for RawCodec {
    fn codec_id(&self) -> &str {
        "raw"
    }

    fn codec_version(&self) -> &str {
        "1"
    }

    fn encode(&self, window: &[f64]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(window.len() * 2);
        for &sample in window {
            let clamped = sample.clamp(-1.0, 1.0);
            let quantized = (clamped * self.scale).round();
            let quantized = quantized.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            out.extend_from_slice(&quantized.to_le_bytes());
        }
        Ok(out)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        if payload.len() % 2 != 0 {
            return Err(CodecError::InvalidPayload(format!(
                "raw payload length {} is not a multiple of 2",
                payload.len()
            )));
        }
        Ok(payload
            .chunks_exact(2)
            .map(|chunk| {
                let value = i16::from_le_bytes([chunk[0], chunk[1]]);
                value as f64 / self.scale
            })
            .collect())
    }

    fn payload_schema(&self) -> String {
        format!("raw:int16:le:scale={}", self.scale)
    }
}
