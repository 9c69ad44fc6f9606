//! Binds a codec's identity (id, version, payload schema hash, optional norm
//! file hash) into a signed-at-rest manifest, and verifies it against a
//! `RunSpec` and a live codec instance before a run starts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::{payload_schema_hash, Codec};
use crate::config::runspec::RunSpec;
use crate::error::{ConfigError, ManifestError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsManifest {
    pub codec_id: String,
    pub codec_version: String,
    pub git_commit: Option<String>,
    pub norm_params_hash: Option<String>,
    pub payload_schema_hash: String,
    pub created_at: String,
}

impl ArtifactsManifest {
    /// Deterministic fingerprint: SHA-256 of the manifest's canonical JSON.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let value = serde_json::to_value(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialise manifest: {e}")))?;
        let canonical = canonical_json(&value);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            format: "json",
            source: Box::new(source),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialise manifest: {e}")))?;
        std::fs::write(path, text).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Serialises a JSON value with object keys sorted, matching Python's
/// `json.dumps(..., sort_keys=True)` used to compute the original
/// fingerprint.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        serde_json::Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

/// Hashes a file's raw contents (used for `norm_params_hash` verification).
pub fn hash_file(path: impl AsRef<Path>) -> Result<String, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Fatal pre-flight check binding a run's declared codec to the manifest
/// that was produced when the codec's weights/schema were last validated.
pub fn verify_manifest(
    runspec: &RunSpec,
    manifest: &ArtifactsManifest,
    codec: &dyn Codec,
) -> Result<(), ManifestError> {
    if manifest.codec_id != runspec.codec.id {
        return Err(ManifestError::CodecIdMismatch {
            manifest: manifest.codec_id.clone(),
            expected: runspec.codec.id.clone(),
        });
    }
    if manifest.codec_version != runspec.codec.version {
        return Err(ManifestError::CodecVersionMismatch {
            manifest: manifest.codec_version.clone(),
            expected: runspec.codec.version.clone(),
        });
    }
    let schema_hash = payload_schema_hash(&codec.payload_schema());
    if manifest.payload_schema_hash != schema_hash {
        return Err(ManifestError::SchemaHashMismatch {
            manifest: manifest.payload_schema_hash.clone(),
            actual: schema_hash,
        });
    }
    if let Some(expected_hash) = &manifest.norm_params_hash {
        let norm_path = runspec
            .codec
            .params
            .get("norm_path")
            .and_then(|v| v.as_str());
        if let Some(norm_path) = norm_path {
            let actual = hash_file(norm_path).map_err(ManifestError::Config)?;
            if &actual != expected_hash {
                return Err(ManifestError::NormHashMismatch {
                    manifest: expected_hash.clone(),
                    actual,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::raw::RawCodec;
    use crate::config::runspec::{
        AckTimeout, CodecSpec, LoggingSpec, Mode, PhySpec, Role, TxSpec, WindowSpec,
    };
    use std::collections::HashMap;

    fn sample_runspec(codec_id: &str, codec_version: &str) -> RunSpec {
        RunSpec {
            run_id: "run1".into(),
            role: Role::Tx,
            mode: Mode::Raw,
            phy: PhySpec {
                sf: 7,
                bw_hz: 125_000,
                cr: 5,
                preamble: 8,
                crc_on: true,
                explicit_header: true,
                tx_power_dbm: 14,
                ldro: None,
            },
            window: WindowSpec {
                dims: 12,
                w: 1,
                stride: 1,
                sample_hz: 1.0,
            },
            codec: CodecSpec {
                id: codec_id.into(),
                version: codec_version.into(),
                params: HashMap::new(),
            },
            tx: TxSpec {
                guard_ms: 50,
                ack_timeout_ms: AckTimeout::Auto,
                max_retries: 3,
                max_inflight: 1,
                max_windows: Some(10),
            },
            max_payload_bytes: 64,
            logging: LoggingSpec {
                out_dir: "./out".into(),
            },
            artifacts_manifest: None,
        }
    }

    fn sample_manifest(codec: &RawCodec) -> ArtifactsManifest {
        ArtifactsManifest {
            codec_id: "raw".into(),
            codec_version: "1".into(),
            git_commit: None,
            norm_params_hash: None,
            payload_schema_hash: payload_schema_hash(&codec.payload_schema()),
            created_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn verifies_matching_manifest() {
        let codec = RawCodec::default();
        let runspec = sample_runspec("raw", "1");
        let manifest = sample_manifest(&codec);
        assert!(verify_manifest(&runspec, &manifest, &codec).is_ok());
    }

    #[test]
    fn rejects_codec_id_mismatch() {
        let codec = RawCodec::default();
        let runspec = sample_runspec("sensor12_packed", "1");
        let manifest = sample_manifest(&codec);
        assert!(matches!(
            verify_manifest(&runspec, &manifest, &codec),
            Err(ManifestError::CodecIdMismatch { .. })
        ));
    }

    #[test]
    fn rejects_schema_hash_mismatch() {
        let codec = RawCodec::new(1000.0);
        let runspec = sample_runspec("raw", "1");
        let stale_codec = RawCodec::default();
        let manifest = sample_manifest(&stale_codec);
        assert!(matches!(
            verify_manifest(&runspec, &manifest, &codec),
            Err(ManifestError::SchemaHashMismatch { .. })
        ));
    }

    #[test]
    fn fingerprint_is_stable_for_same_manifest() {
        let codec = RawCodec::default();
        let manifest = sample_manifest(&codec);
        assert_eq!(manifest.fingerprint().unwrap(), manifest.fingerprint().unwrap());
    }

    #[test]
    fn save_load_roundtrip() {
        let codec = RawCodec::default();
        let manifest = sample_manifest(&codec);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        manifest.save(&path).unwrap();
        let loaded = ArtifactsManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }
}
