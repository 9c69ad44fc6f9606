//! Sidecar JSONL log of the raw windows fed into the TX pipeline, kept
//! separate from the protocol event log so offline tooling can replay
//! exactly what was encoded without re-deriving it from telemetry.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde_json::json;

use crate::error::ConfigError;

pub struct DatasetLogger {
    file: File,
    run_id: String,
    order: Vec<String>,
    units: Option<serde_json::Value>,
}

impl DatasetLogger {
    pub fn new(
        path: impl AsRef<Path>,
        run_id: &str,
        order: Vec<String>,
        units: Option<serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            file,
            run_id: run_id.to_string(),
            order,
            units,
        })
    }

    pub fn log_window(&mut self, window_id: u64, ts_ms: u64, window: &[f64]) -> Result<(), ConfigError> {
        let record = json!({
            "ts_ms": ts_ms,
            "run_id": self.run_id,
            "window_id": window_id,
            "order": self.order,
            "units": self.units,
            "window": window,
        });
        let mut line = serde_json::to_string(&record)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialise window: {e}")))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| ConfigError::Read {
                path: "dataset log".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    #[test]
    fn logs_window_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");
        let mut logger = DatasetLogger::new(&path, "run1", vec!["lat".into(), "lon".into()], None).unwrap();
        logger.log_window(0, 100, &[1.0, 2.0]).unwrap();

        let reader = BufReader::new(File::open(&path).unwrap());
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed["window_id"], 0);
        assert_eq!(parsed["window"][0], 1.0);
        assert_eq!(parsed["order"][1], "lon");
    }
}
