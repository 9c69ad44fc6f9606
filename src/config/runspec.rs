//! Run specification: the validated configuration that binds a PHY profile,
//! window shape, codec choice, ARQ timing, and logging sink to one run.
//!
//! Loading from JSON or YAML is extension-sniffed.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Role a node plays in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tx,
    Rx,
    Controller,
}

/// Codec family: raw baseline vs learned latent codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "RAW")]
    Raw,
    #[serde(rename = "LATENT")]
    Latent,
}

/// LoRa PHY parameters. Fixed for a run; both ends must agree out-of-band
/// Both ends must agree on it out-of-band; there is no in-band negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhySpec {
    pub sf: u32,
    pub bw_hz: u32,
    pub cr: u32,
    pub preamble: u32,
    pub crc_on: bool,
    pub explicit_header: bool,
    pub tx_power_dbm: i32,
    #[serde(default)]
    pub ldro: Option<bool>,
}

impl PhySpec {
    /// Canonical cross-run key.
    pub fn profile_id(&self) -> String {
        format!(
            "sf{}_bw{}_cr{}_pre{}_crc{}_hdr{}_pwr{}",
            self.sf,
            self.bw_hz,
            self.cr,
            self.preamble,
            self.crc_on as u8,
            self.explicit_header as u8,
            self.tx_power_dbm
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(5..=12).contains(&self.sf) {
            return Err(ConfigError::Invalid(format!(
                "phy.sf must be 5..=12, got {}",
                self.sf
            )));
        }
        if self.bw_hz == 0 {
            return Err(ConfigError::Invalid("phy.bw_hz must be > 0".into()));
        }
        if !(1..=8).contains(&self.cr) {
            return Err(ConfigError::Invalid(format!(
                "phy.cr must be 1..=4 (index) or 5..=8 (denominator), got {}",
                self.cr
            )));
        }
        Ok(())
    }
}

/// Window shape and sampling rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(default = "default_dims")]
    pub dims: u32,
    #[serde(rename = "W")]
    pub w: u32,
    pub stride: u32,
    pub sample_hz: f64,
}

fn default_dims() -> u32 {
    12
}

impl WindowSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.dims == 0 || self.w == 0 || self.stride == 0 {
            return Err(ConfigError::Invalid(
                "window dims, W, and stride must be > 0".into(),
            ));
        }
        if self.sample_hz <= 0.0 {
            return Err(ConfigError::Invalid("window sample_hz must be > 0".into()));
        }
        Ok(())
    }
}

/// Codec selection and its free-form parameters (interpreted by
/// `crate::codec::factory::create_codec`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecSpec {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// ACK timeout: either an explicit value, or derived per-send from the
/// current payload's estimated time-on-air.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AckTimeout {
    Auto,
    Fixed(u32),
}

impl Serialize for AckTimeout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AckTimeout::Auto => serializer.serialize_none(),
            AckTimeout::Fixed(ms) => serializer.serialize_u32(*ms),
        }
    }
}

impl<'de> Deserialize<'de> for AckTimeout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AckTimeoutVisitor;

        impl<'de> Visitor<'de> for AckTimeoutVisitor {
            type Value = AckTimeout;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("null, the string \"auto\", or a positive integer")
            }

            fn visit_unit<E>(self) -> Result<AckTimeout, E> {
                Ok(AckTimeout::Auto)
            }

            fn visit_none<E>(self) -> Result<AckTimeout, E> {
                Ok(AckTimeout::Auto)
            }

            fn visit_str<E>(self, value: &str) -> Result<AckTimeout, E>
            where
                E: de::Error,
            {
                if value.eq_ignore_ascii_case("auto") {
                    Ok(AckTimeout::Auto)
                } else {
                    Err(de::Error::custom(format!(
                        "invalid ack_timeout_ms string: {value:?}"
                    )))
                }
            }

            fn visit_u64<E>(self, value: u64) -> Result<AckTimeout, E>
            where
                E: de::Error,
            {
                u32::try_from(value)
                    .map(AckTimeout::Fixed)
                    .map_err(|_| de::Error::custom("ack_timeout_ms out of range"))
            }

            fn visit_i64<E>(self, value: i64) -> Result<AckTimeout, E>
            where
                E: de::Error,
            {
                if value <= 0 {
                    return Err(de::Error::custom("ack_timeout_ms must be positive"));
                }
                self.visit_u64(value as u64)
            }
        }

        deserializer.deserialize_any(AckTimeoutVisitor)
    }
}

/// TX-side ARQ and scheduling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TxSpec {
    pub guard_ms: u32,
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_ms: AckTimeout,
    pub max_retries: u32,
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    #[serde(default)]
    pub max_windows: Option<u64>,
}

fn default_ack_timeout() -> AckTimeout {
    AckTimeout::Auto
}

fn default_max_inflight() -> usize {
    1
}

impl TxSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if let AckTimeout::Fixed(ms) = self.ack_timeout_ms {
            if ms == 0 {
                return Err(ConfigError::Invalid(
                    "tx.ack_timeout_ms must be positive when fixed".into(),
                ));
            }
        }
        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid("tx.max_inflight must be > 0".into()));
        }
        Ok(())
    }
}

/// Event-log sink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSpec {
    pub out_dir: String,
}

/// Top-level validated run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub run_id: String,
    pub role: Role,
    pub mode: Mode,
    pub phy: PhySpec,
    pub window: WindowSpec,
    pub codec: CodecSpec,
    pub tx: TxSpec,
    pub max_payload_bytes: usize,
    pub logging: LoggingSpec,
    #[serde(default)]
    pub artifacts_manifest: Option<String>,
}

impl RunSpec {
    /// Cross-field validation beyond what serde's types already enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_id.is_empty() {
            return Err(ConfigError::Invalid("run_id must be non-empty".into()));
        }
        self.phy.validate()?;
        self.window.validate()?;
        self.tx.validate()?;
        if self.max_payload_bytes == 0 || self.max_payload_bytes > 255 {
            return Err(ConfigError::Invalid(
                "max_payload_bytes must be 1..=255".into(),
            ));
        }
        Ok(())
    }

    pub fn phy_profile_id(&self) -> String {
        self.phy.profile_id()
    }

    /// Loads and validates a `RunSpec` from a `.json`, `.yaml`, or `.yml`
    /// file, sniffing the format from the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<RunSpec, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let spec: RunSpec = if is_yaml {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                format: "yaml",
                source: Box::new(source),
            })?
        } else {
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                format: "json",
                source: Box::new(source),
            })?
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Serialises to JSON or YAML and writes to `path`, sniffed the same way
    /// as `load`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let text = if is_yaml {
            serde_yaml::to_string(self).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                format: "yaml",
                source: Box::new(source),
            })?
        } else {
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                format: "json",
                source: Box::new(source),
            })?
        };
        std::fs::write(path, text).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_runspec() -> RunSpec {
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
                id: "raw".into(),
                version: "1".into(),
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

    #[test]
    fn validates_good_spec() {
        sample_runspec().validate().unwrap();
    }

    #[test]
    fn rejects_bad_sf() {
        let mut spec = sample_runspec();
        spec.phy.sf = 20;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_zero_window() {
        let mut spec = sample_runspec();
        spec.window.w = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn phy_profile_id_format() {
        let spec = sample_runspec();
        assert_eq!(spec.phy_profile_id(), "sf7_bw125000_cr5_pre8_crc1_hdr1_pwr14");
    }

    #[test]
    fn ack_timeout_json_roundtrip() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            ack_timeout_ms: AckTimeout,
        }
        let auto: Wrap = serde_json::from_str(r#"{"ack_timeout_ms": null}"#).unwrap();
        assert_eq!(auto.ack_timeout_ms, AckTimeout::Auto);
        let auto_str: Wrap = serde_json::from_str(r#"{"ack_timeout_ms": "auto"}"#).unwrap();
        assert_eq!(auto_str.ack_timeout_ms, AckTimeout::Auto);
        let fixed: Wrap = serde_json::from_str(r#"{"ack_timeout_ms": 250}"#).unwrap();
        assert_eq!(fixed.ack_timeout_ms, AckTimeout::Fixed(250));
    }

    #[test]
    fn load_save_roundtrip_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let spec = sample_runspec();
        spec.save(&path).unwrap();
        let loaded = RunSpec::load(&path).unwrap();
        assert_eq!(loaded, spec);
    }

    #[test]
    fn load_save_roundtrip_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        let spec = sample_runspec();
        spec.save(&path).unwrap();
        let loaded = RunSpec::load(&path).unwrap();
        assert_eq!(loaded, spec);
    }
}
