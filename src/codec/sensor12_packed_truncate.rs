//! Lossy baseline: wraps `Sensor12PackedCodec` but forces the wire payload
//! to a fixed `payload_bytes`, zero-padding or truncating.

use crate::codec::sensor12_packed::Sensor12PackedCodec;
use crate::codec::Codec;
use crate::error::CodecError;

#[derive(Debug, Clone)]
pub struct Sensor12PackedTruncateCodec {
    inner: Sensor12PackedCodec,
    payload_bytes: usize,
    window_w: usize,
}

impl Sensor12PackedTruncateCodec {
    pub fn new(
        payload_bytes: usize,
        window_w: usize,
        accel_scale: f64,
        gyro_scale: f64,
        rpy_scale: f64,
    ) -> Self {
        Self {
            inner: Sensor12PackedCodec::new(accel_scale, gyro_scale, rpy_scale),
            payload_bytes,
            window_w,
        }
    }

    fn full_len(&self) -> usize {
        Sensor12PackedCodec::STEP_SIZE * self.window_w
    }
}

impl Codec for Sensor12PackedTruncateCodec {
    fn codec_id(&self) -> &str {
        "sensor12_packed_truncate"
    }

    fn codec_version(&self) -> &str {
        "1"
    }

    fn encode(&self, window: &[f64]) -> Result<Vec<u8>, CodecError> {
        if window.len() % 12 != 0 {
            return Err(CodecError::InvalidInput(format!(
                "sensor12_packed_truncate window length {} is not a multiple of 12",
                window.len()
            )));
        }
        let inferred_w = window.len() / 12;
        if inferred_w != self.window_w {
            return Err(CodecError::InvalidInput(format!(
                "window implies W={inferred_w} but codec configured for W={}",
                self.window_w
            )));
        }
        let mut full = self.inner.encode(window)?;
        full.resize(self.payload_bytes, 0);
        Ok(full)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        let mut padded = payload.to_vec();
        padded.resize(self.full_len(), 0);
        self.inner.decode(&padded)
    }

    fn payload_schema(&self) -> String {
        format!(
            "sensor12_packed_truncate:v1:payload_bytes={}:W={}:{}",
            self.payload_bytes,
            self.window_w,
            self.inner.payload_schema()
        )
    }
}
