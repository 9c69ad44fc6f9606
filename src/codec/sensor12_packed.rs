//! Fixed-point 12-channel sensor codec: GPS as `f32`, everything else as
//! scaled, clamped `i16`. 30 bytes per step.

use crate::codec::Codec;
use crate::constants::SENSOR12_PACKED_STEP_BYTES;
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scales {
    accel: f64,
    gyro: f64,
    rpy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensor12PackedCodec {
    scales: Scales,
}

fn clamp_i16(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

impl Sensor12PackedCodec {
    pub const STEP_SIZE: usize = SENSOR12_PACKED_STEP_BYTES;

    pub fn new(accel_scale: f64, gyro_scale: f64, rpy_scale: f64) -> Self {
        Self {
            scales: Scales {
                accel: accel_scale,
                gyro: gyro_scale,
                rpy: rpy_scale,
            },
        }
    }
}

impl Default for Sensor12PackedCodec {
    fn default() -> Self {
        Self::new(1000.0, 10.0, 10.0)
    }
}

impl Codec for Sensor12PackedCodec {
    fn codec_id(&self) -> &str {
        "sensor12_packed"
    }

    fn codec_version(&self) -> &str {
        "1"
    }

    fn encode(&self, window: &[f64]) -> Result<Vec<u8>, CodecError> {
        if window.len() % 12 != 0 {
            return Err(CodecError::InvalidInput(format!(
                "sensor12_packed window length {} is not a multiple of 12",
                window.len()
            )));
        }
        let mut out = Vec::with_capacity(window.len() / 12 * Self::STEP_SIZE);
        for step in window.chunks_exact(12) {
            let (lat, lon, alt) = (step[0], step[1], step[2]);
            out.extend_from_slice(&(lat as f32).to_le_bytes());
            out.extend_from_slice(&(lon as f32).to_le_bytes());
            out.extend_from_slice(&(alt as f32).to_le_bytes());

            let accel = &step[3..6];
            let gyro = &step[6..9];
            let rpy = &step[9..12];
            for &v in accel {
                out.extend_from_slice(&clamp_i16(v * self.scales.accel).to_le_bytes());
            }
            for &v in gyro {
                out.extend_from_slice(&clamp_i16(v * self.scales.gyro).to_le_bytes());
            }
            for &v in rpy {
                out.extend_from_slice(&clamp_i16(v * self.scales.rpy).to_le_bytes());
            }
        }
        Ok(out)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        if payload.len() % Self::STEP_SIZE != 0 {
            return Err(CodecError::InvalidPayload(format!(
                "sensor12_packed payload length {} is not a multiple of {}",
                payload.len(),
                Self::STEP_SIZE
            )));
        }
        let mut out = Vec::with_capacity(payload.len() / Self::STEP_SIZE * 12);
        for step in payload.chunks_exact(Self::STEP_SIZE) {
            let lat = f32::from_le_bytes([step[0], step[1], step[2], step[3]]) as f64;
            let lon = f32::from_le_bytes([step[4], step[5], step[6], step[7]]) as f64;
            let alt = f32::from_le_bytes([step[8], step[9], step[10], step[11]]) as f64;
            out.push(lat);
            out.push(lon);
            out.push(alt);

            let mut offset = 12;
            for &scale in &[self.scales.accel, self.scales.accel, self.scales.accel] {
                let v = i16::from_le_bytes([step[offset], step[offset + 1]]);
                out.push(v as f64 / scale);
                offset += 2;
            }
            for &scale in &[self.scales.gyro, self.scales.gyro, self.scales.gyro] {
                let v = i16::from_le_bytes([step[offset], step[offset + 1]]);
                out.push(v as f64 / scale);
                offset += 2;
            }
            for &scale in &[self.scales.rpy, self.scales.rpy, self.scales.rpy] {
                let v = i16::from_le_bytes([step[offset], step[offset + 1]]);
                out.push(v as f64 / scale);
                offset += 2;
            }
        }
        Ok(out)
    }

    fn payload_schema(&self) -> String {
        format!(
            "sensor12_packed:v1:gps_f32le+accel_i16le@{}+gyro_i16le@{}+rpy_i16le@{}",
            self.scales.accel, self.scales.gyro, self.scales.rpy
        )
    }
}
