//! Learned latent codec: a stack of linear layers run forward (encode) and
//! in reverse (decode), each optionally refined across several cycles using
//! a paired forward/backward weight matrix, with an optional nonlinear
//! "transmission" squashing function applied between layers.
//!
//! Layer weights are loaded from `layer_<i>.json` files (see
//! `crate::codec::bam_artifacts` for the on-disk format), one file per
//! layer rather than a single archive.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::bam_artifacts::{BamArtifacts, Packing};
use crate::codec::Codec;
use crate::constants::BAM_MAX_DELTA_WITH_CYCLES;
use crate::error::CodecError;

#[derive(Debug, Deserialize)]
struct LayerFile {
    /// Forward weight matrix, `out_dim` rows of `in_dim` columns.
    w: Vec<Vec<f32>>,
    /// Backward (refinement) weight matrix, `in_dim` rows of `out_dim` columns.
    v: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
struct Layer {
    w: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
    in_dim: usize,
    out_dim: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct NormParams {
    mean: Vec<f64>,
    std: Vec<f64>,
}

pub struct BamCodec {
    artifacts: BamArtifacts,
    layers: Vec<Layer>,
    norm: Option<NormParams>,
}

fn matvec(matrix: &[Vec<f64>], vector: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vector).map(|(w, x)| w * x).sum())
        .collect()
}

fn transmission(vector: &[f64], delta: Option<f64>) -> Vec<f64> {
    match delta {
        None => vector.to_vec(),
        Some(d) if d == 0.0 => vector.to_vec(),
        Some(d) => vector
            .iter()
            .map(|&x| ((d + 1.0) * x - d * x.powi(3)).clamp(-1.0, 1.0))
            .collect(),
    }
}

impl BamCodec {
    /// Loads a BAM codec from an artifacts description and the directory
    /// holding its `layer_<i>.json` files (and optional norm file).
    pub fn from_manifest(artifacts: BamArtifacts, base_dir: impl AsRef<Path>) -> Result<Self, CodecError> {
        Self::validate_dynamics(&artifacts)?;
        let base_dir = base_dir.as_ref();
        let layers = Self::load_layers(&artifacts, base_dir)?;
        let norm = Self::load_norm(&artifacts, base_dir)?;
        Ok(Self {
            artifacts,
            layers,
            norm,
        })
    }

    fn validate_dynamics(artifacts: &BamArtifacts) -> Result<(), CodecError> {
        if artifacts.encode_cycles > 0 || artifacts.decode_cycles > 0 {
            if let Some(delta) = artifacts.delta {
                if delta >= BAM_MAX_DELTA_WITH_CYCLES {
                    return Err(CodecError::Artifact(format!(
                        "delta {delta} must be < {BAM_MAX_DELTA_WITH_CYCLES} when refinement cycles are enabled"
                    )));
                }
            }
        }
        Ok(())
    }

    fn load_layers(artifacts: &BamArtifacts, base_dir: &Path) -> Result<Vec<Layer>, CodecError> {
        if artifacts.model_format != "layer_json_v1" {
            return Err(CodecError::Artifact(format!(
                "unsupported model_format: {}",
                artifacts.model_format
            )));
        }
        let model_dir: PathBuf = base_dir.join(&artifacts.model_path);
        let mut entries: Vec<(u32, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&model_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("layer_") {
                if let Some(idx_str) = rest.strip_suffix(".json") {
                    if let Ok(idx) = idx_str.parse::<u32>() {
                        entries.push((idx, entry.path()));
                    }
                }
            }
        }
        if entries.is_empty() {
            return Err(CodecError::Artifact(format!(
                "no layer_*.json files found in {}",
                model_dir.display()
            )));
        }
        entries.sort_by_key(|(idx, _)| *idx);

        let mut layers = Vec::with_capacity(entries.len());
        let mut expected_in = artifacts.expected_input_len();
        for (idx, path) in entries {
            let text = fs::read_to_string(&path)?;
            let raw: LayerFile = serde_json::from_str(&text)?;
            let out_dim = raw.w.len();
            let in_dim = raw.w.first().map(|r| r.len()).unwrap_or(0);
            if in_dim != expected_in {
                return Err(CodecError::Artifact(format!(
                    "layer {idx} expects input dim {expected_in}, W has {in_dim}"
                )));
            }
            if raw.v.len() != in_dim || raw.v.first().map(|r| r.len()).unwrap_or(0) != out_dim {
                return Err(CodecError::Artifact(format!(
                    "layer {idx} V shape must be ({in_dim}, {out_dim})"
                )));
            }
            let w: Vec<Vec<f64>> = raw.w.iter().map(|r| r.iter().map(|&x| x as f64).collect()).collect();
            let v: Vec<Vec<f64>> = raw.v.iter().map(|r| r.iter().map(|&x| x as f64).collect()).collect();
            layers.push(Layer { w, v, in_dim, out_dim });
            expected_in = out_dim;
        }
        let final_dim = layers.last().map(|l| l.out_dim).unwrap_or(0);
        if final_dim != artifacts.latent_dim {
            return Err(CodecError::Artifact(format!(
                "final layer output dim {final_dim} does not match latent_dim {}",
                artifacts.latent_dim
            )));
        }
        Ok(layers)
    }

    fn load_norm(artifacts: &BamArtifacts, base_dir: &Path) -> Result<Option<NormParams>, CodecError> {
        let Some(norm_path) = &artifacts.norm_path else {
            return Ok(None);
        };
        let text = fs::read_to_string(base_dir.join(norm_path))?;
        let norm: NormParams = serde_json::from_str(&text)?;
        let expected = artifacts.expected_input_len();
        if norm.mean.len() != expected || norm.std.len() != expected {
            return Err(CodecError::Artifact(format!(
                "norm params must have length {expected}"
            )));
        }
        if norm.std.iter().any(|&s| s < 0.0) {
            return Err(CodecError::Artifact("norm std must be non-negative".into()));
        }
        Ok(Some(norm))
    }

    fn apply_norm(&self, vector: &[f64]) -> Vec<f64> {
        match &self.norm {
            None => vector.to_vec(),
            Some(norm) => vector
                .iter()
                .zip(&norm.mean)
                .zip(&norm.std)
                .map(|((&x, &mean), &std)| if std == 0.0 { 0.0 } else { (x - mean) / std })
                .collect(),
        }
    }

    fn invert_norm(&self, vector: &[f64]) -> Vec<f64> {
        match &self.norm {
            None => vector.to_vec(),
            Some(norm) => vector
                .iter()
                .zip(&norm.mean)
                .zip(&norm.std)
                .map(|((&x, &mean), &std)| if std == 0.0 { mean } else { x * std + mean })
                .collect(),
        }
    }

    fn pack(&self, vector: &[f64]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(self.artifacts.expected_payload_bytes());
        match self.artifacts.packing {
            Packing::Int8 => {
                let scale = self.artifacts.scale.ok_or_else(|| {
                    CodecError::Artifact("int8 packing requires a scale".into())
                })?;
                for &v in vector {
                    let q = (v * scale).round().clamp(i8::MIN as f64, i8::MAX as f64) as i8;
                    out.push(q as u8);
                }
            }
            Packing::Int16 => {
                let scale = self.artifacts.scale.ok_or_else(|| {
                    CodecError::Artifact("int16 packing requires a scale".into())
                })?;
                for &v in vector {
                    let q = (v * scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                    out.extend_from_slice(&q.to_le_bytes());
                }
            }
            Packing::Float16 => {
                for &v in vector {
                    let bits = half_from_f64(v);
                    out.extend_from_slice(&bits.to_le_bytes());
                }
            }
            Packing::Float32 => {
                for &v in vector {
                    out.extend_from_slice(&(v as f32).to_le_bytes());
                }
            }
        }
        Ok(out)
    }

    fn unpack(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        let expected = self.artifacts.expected_payload_bytes();
        if payload.len() != expected {
            return Err(CodecError::InvalidPayload(format!(
                "bam payload length {} does not match expected {expected}",
                payload.len()
            )));
        }
        let out = match self.artifacts.packing {
            Packing::Int8 => {
                let scale = self.artifacts.scale.ok_or_else(|| {
                    CodecError::Artifact("int8 packing requires a scale".into())
                })?;
                payload.iter().map(|&b| (b as i8) as f64 / scale).collect()
            }
            Packing::Int16 => {
                let scale = self.artifacts.scale.ok_or_else(|| {
                    CodecError::Artifact("int16 packing requires a scale".into())
                })?;
                payload
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]) as f64 / scale)
                    .collect()
            }
            Packing::Float16 => payload
                .chunks_exact(2)
                .map(|c| half_to_f64(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            Packing::Float32 => payload
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
        };
        Ok(out)
    }
}

impl Codec for BamCodec {
    fn codec_id(&self) -> &str {
        "bam"
    }

    fn codec_version(&self) -> &str {
        "1"
    }

    fn encode(&self, window: &[f64]) -> Result<Vec<u8>, CodecError> {
        let expected = self.artifacts.expected_input_len();
        if window.len() != expected {
            return Err(CodecError::InvalidInput(format!(
                "bam encode window length {} does not match expected {expected}",
                window.len()
            )));
        }
        let normed = self.apply_norm(window);
        let mut x = normed;
        for layer in &self.layers {
            let mut y = transmission(&matvec(&layer.w, &x), self.artifacts.delta);
            for _ in 0..self.artifacts.encode_cycles {
                let back = transmission(&matvec(&layer.v, &y), self.artifacts.delta);
                y = transmission(&matvec(&layer.w, &back), self.artifacts.delta);
            }
            x = y;
        }
        self.pack(&x)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        let mut y = self.unpack(payload)?;
        for layer in self.layers.iter().rev() {
            let mut x = transmission(&matvec(&layer.v, &y), self.artifacts.delta);
            for _ in 0..self.artifacts.decode_cycles {
                let forward = transmission(&matvec(&layer.w, &x), self.artifacts.delta);
                x = transmission(&matvec(&layer.v, &forward), self.artifacts.delta);
            }
            y = x;
            let _ = layer.in_dim;
        }
        Ok(self.invert_norm(&y))
    }

    fn payload_schema(&self) -> String {
        format!(
            "bam:v{}:latent_dim={}:packing={:?}:scale={:?}:delta={:?}",
            self.artifacts.manifest_version,
            self.artifacts.latent_dim,
            self.artifacts.packing,
            self.artifacts.scale,
            self.artifacts.delta,
        )
    }
}

/// Minimal IEEE-754 binary16 <-> f64 conversion (no external half-float
/// crate is in this crate's dependency stack, so this stays local).
fn half_from_f64(value: f64) -> u16 {
    let f = value as f32;
    let bits = f.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mantissa = bits & 0x7fffff;
    if exp <= 0 {
        (sign as u16) | 0
    } else if exp >= 0x1f {
        (sign | 0x7c00) as u16
    } else {
        (sign | ((exp as u32) << 10) | (mantissa >> 13)) as u16
    }
}

fn half_to_f64(bits: u16) -> f64 {
    let sign = (bits & 0x8000) as u32;
    let exp = (bits >> 10) & 0x1f;
    let mantissa = (bits & 0x3ff) as u32;
    let f_bits = if exp == 0 {
        (sign << 16) | (mantissa << 13)
    } else if exp == 0x1f {
        (sign << 16) | 0x7f800000 | (mantissa << 13)
    } else {
        let f_exp = (exp as u32 + 127 - 15) << 23;
        (sign << 16) | f_exp | (mantissa << 13)
    };
    f32::from_bits(f_bits) as f64
}
