//! Append-only JSONL event log: the data product consumed offline by
//! `crate::experiments::metrics::compute_metrics`. Distinct from
//! `crate::logging`, which is operator-facing diagnostic logging.
//!
//! The envelope names the PHY field `phy_id`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::config::artifacts::ArtifactsManifest;
use crate::config::runspec::RunSpec;
use crate::error::ConfigError;
use crate::runtime::Clock;

/// Appends structured events to `{out_dir}/{run_id}_{role}.jsonl`.
pub struct JsonlLogger {
    file: File,
    run_id: String,
    role: String,
    mode: String,
    phy_id: String,
}

impl JsonlLogger {
    pub fn new(
        out_dir: impl AsRef<Path>,
        run_id: &str,
        role: &str,
        mode: &str,
        phy_id: &str,
    ) -> Result<Self, ConfigError> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir).map_err(|source| ConfigError::Read {
            path: out_dir.display().to_string(),
            source,
        })?;
        let path = out_dir.join(format!("{run_id}_{role}.jsonl"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            file,
            run_id: run_id.to_string(),
            role: role.to_string(),
            mode: mode.to_string(),
            phy_id: phy_id.to_string(),
        })
    }

    fn base_event(&self, clock: &dyn Clock, event: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ts_ms".into(), json!(clock.now_ms()));
        map.insert("run_id".into(), json!(self.run_id));
        map.insert("event".into(), json!(event));
        map.insert("role".into(), json!(self.role));
        map.insert("mode".into(), json!(self.mode));
        map.insert("phy_id".into(), json!(self.phy_id));
        map
    }

    /// Logs the mandatory `run_start` event: run configuration, manifest,
    /// and manifest fingerprint, so every later event in the file can be
    /// traced back to exactly what produced it.
    pub fn log_run_start(
        &mut self,
        clock: &dyn Clock,
        runspec: &RunSpec,
        manifest: Option<&ArtifactsManifest>,
    ) -> Result<(), ConfigError> {
        let mut fields = Map::new();
        fields.insert(
            "runspec".into(),
            serde_json::to_value(runspec)
                .map_err(|e| ConfigError::Invalid(format!("failed to serialise runspec: {e}")))?,
        );
        if let Some(manifest) = manifest {
            fields.insert(
                "manifest".into(),
                serde_json::to_value(manifest).map_err(|e| {
                    ConfigError::Invalid(format!("failed to serialise manifest: {e}"))
                })?,
            );
            fields.insert("manifest_fingerprint".into(), json!(manifest.fingerprint()?));
        }
        self.log_event(clock, "run_start", fields)
    }

    /// Logs an arbitrary event, merging the base envelope with `fields`.
    pub fn log_event(
        &mut self,
        clock: &dyn Clock,
        event: &str,
        fields: Map<String, Value>,
    ) -> Result<(), ConfigError> {
        let mut record = self.base_event(clock, event);
        record.extend(fields);
        self.write(&Value::Object(record))
    }

    fn write(&mut self, value: &Value) -> Result<(), ConfigError> {
        let mut line = serde_json::to_string(value)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialise event: {e}")))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| ConfigError::Read {
                path: format!("{}_{}.jsonl", self.run_id, self.role),
                source,
            })
    }
}
