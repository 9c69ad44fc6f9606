//! Declarative description of a trained BAM (bidirectional autoencoder)
//! model: dimensions, packing, and refinement cycle counts.
//!
//! Layer weights are stored as sibling `layer_<i>.json` files holding
//! row-major `{"w": [[f32..]], "v": [[f32..]]}` matrices.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// On-wire number packing for latent vector elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packing {
    Int8,
    Int16,
    Float16,
    Float32,
}

impl Packing {
    fn bytes_per_element(self) -> usize {
        match self {
            Packing::Int8 => 1,
            Packing::Int16 => 2,
            Packing::Float16 => 2,
            Packing::Float32 => 4,
        }
    }
}

/// Trained-model description bound into a run via `ArtifactsManifest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BamArtifacts {
    pub manifest_version: u32,
    pub model_format: String,
    pub model_path: String,
    pub latent_dim: usize,
    pub packing: Packing,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub encode_cycles: u32,
    #[serde(default)]
    pub decode_cycles: u32,
    pub input_dims: usize,
    pub window_w: usize,
    #[serde(default = "default_stride")]
    pub window_stride: usize,
    #[serde(default)]
    pub norm_path: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_stride() -> usize {
    1
}

impl BamArtifacts {
    pub fn from_dict(value: serde_json::Value) -> Result<Self, CodecError> {
        serde_json::from_value(value)
            .map_err(|e| CodecError::Artifact(format!("invalid bam artifacts: {e}")))
    }

    pub fn expected_input_len(&self) -> usize {
        self.input_dims * self.window_w
    }

    pub fn expected_payload_bytes(&self) -> usize {
        self.packing.bytes_per_element() * self.latent_dim
    }
}
