//! Compresses an inner codec's output with DEFLATE.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::codec::raw::RawCodec;
use crate::codec::Codec;
use crate::error::CodecError;

pub struct ZlibCodec {
    inner: Box<dyn Codec + Send + Sync>,
    level: u32,
}

impl ZlibCodec {
    pub fn new(inner: Box<dyn Codec + Send + Sync>, level: u32) -> Self {
        Self { inner, level }
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new(Box::new(RawCodec::default()), 6)
    }
}

impl Codec for ZlibCodec {
    fn codec_id(&self) -> &str {
        "zlib"
    }

    fn codec_version(&self) -> &str {
        "1"
    }

    fn encode(&self, window: &[f64]) -> Result<Vec<u8>, CodecError> {
        let raw = self.inner.encode(window)?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder
            .write_all(&raw)
            .map_err(|e| CodecError::InvalidInput(format!("zlib compress failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CodecError::InvalidInput(format!("zlib compress failed: {e}")))
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<f64>, CodecError> {
        let mut decoder = ZlibDecoder::new(payload);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| CodecError::InvalidPayload(format!("zlib decompress failed: {e}")))?;
        self.inner.decode(&raw)
    }

    fn payload_schema(&self) -> String {
        format!("zlib:level={}:inner={}", self.level, self.inner.payload_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_compresses_and_decompresses() {
        let codec = ZlibCodec::default();
        let window = vec![0.1, 0.2, 0.3, -0.4];
        let payload = codec.encode(&window).unwrap();
        let decoded = codec.decode(&payload).unwrap();
        for (a, b) in window.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn rejects_garbage_payload() {
        let codec = ZlibCodec::default();
        assert!(codec.decode(&[0xFF, 0x01, 0x02]).is_err());
    }
}
