//! Placeholder codec for dry-run configs that declare a `LATENT` mode
//! without weights available yet. Always raises
//! `CodecError::NotImplemented`.

use crate::codec::Codec;
use crate::error::CodecError;

#[derive(Debug, Clone, Default)]
pub struct BamPlaceholderCodec {
    reason: Option<String>,
}

impl BamPlaceholderCodec {
    pub fn new(reason: Option<String>) -> Self {
        Self { reason }
    }

    fn reason_or_default(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| "bam codec not configured".to_string())
    }
}

impl Codec for BamPlaceholderCodec {
    fn codec_id(&self) -> &str {
        "bam_placeholder"
    }

    fn codec_version(&self) -> &str {
        "1"
    }

    fn encode(&self, _window: &[f64]) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::NotImplemented(self.reason_or_default()))
    }

    fn decode(&self, _payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        Err(CodecError::NotImplemented(self.reason_or_default()))
    }

    fn payload_schema(&self) -> String {
        "bam_placeholder".to_string()
    }
}
