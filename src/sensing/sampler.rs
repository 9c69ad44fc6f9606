//! Pulls `SensorSample`s from a file source, one at a time, optionally
//! looping back to the start for long synthetic runs.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::CodecError;
use crate::sensing::schema::SensorSample;

pub trait SensorSampler {
    /// Returns the next sample, or `None` at end-of-stream (never looping
    /// unless the implementation was configured to).
    fn next_sample(&mut self) -> Result<Option<SensorSample>, CodecError>;
}

/// Reads one JSON object per line.
pub struct JsonlSensorSampler {
    path: PathBuf,
    reader: BufReader<File>,
    looped: bool,
}

impl JsonlSensorSampler {
    pub fn new(path: impl AsRef<Path>, looped: bool) -> Result<Self, CodecError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            looped,
        })
    }

    fn restart(&mut self) -> Result<(), CodecError> {
        let file = File::open(&self.path)?;
        self.reader = BufReader::new(file);
        Ok(())
    }
}

impl SensorSampler for JsonlSensorSampler {
    fn next_sample(&mut self) -> Result<Option<SensorSample>, CodecError> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                if self.looped {
                    self.restart()?;
                    continue;
                }
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            return Ok(Some(SensorSample::from_json(&value)?));
        }
    }
}

/// Reads one CSV row per sample, using the header row as field names and
/// delegating to the same nested-JSON-shaped coercion via an object built
/// from the row.
pub struct CsvSensorSampler {
    path: PathBuf,
    reader: csv_like::Reader,
    looped: bool,
}

impl CsvSensorSampler {
    pub fn new(path: impl AsRef<Path>, looped: bool) -> Result<Self, CodecError> {
        let path = path.as_ref().to_path_buf();
        let reader = csv_like::Reader::open(&path)?;
        Ok(Self { path, reader, looped })
    }
}

impl SensorSampler for CsvSensorSampler {
    fn next_sample(&mut self) -> Result<Option<SensorSample>, CodecError> {
        loop {
            match self.reader.next_row()? {
                Some(value) => return Ok(Some(SensorSample::from_json(&value)?)),
                None => {
                    if self.looped {
                        self.reader = csv_like::Reader::open(&self.path)?;
                        continue;
                    }
                    return Ok(None);
                }
            }
        }
    }
}

/// A tiny header-driven CSV reader: enough for flat `field,field,...`
/// sensor dumps, with no quoting/escaping support (the real data this crate
/// targets is unquoted numeric telemetry).
mod csv_like {
    use std::fs::File;
    use std::io::{BufRead, BufReader, Seek, SeekFrom};
    use std::path::Path;

    use crate::error::CodecError;

    pub struct Reader {
        reader: BufReader<File>,
        header: Vec<String>,
    }

    impl Reader {
        pub fn open(path: &Path) -> Result<Self, CodecError> {
            let file = File::open(path)?;
            let mut reader = BufReader::new(file);
            let mut header_line = String::new();
            reader.read_line(&mut header_line)?;
            let header = header_line.trim().split(',').map(|s| s.to_string()).collect();
            Ok(Self { reader, header })
        }

        pub fn next_row(&mut self) -> Result<Option<serde_json::Value>, CodecError> {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let mut map = serde_json::Map::new();
            for (key, raw) in self.header.iter().zip(trimmed.split(',')) {
                let value = match raw.parse::<f64>() {
                    Ok(n) => serde_json::Value::from(n),
                    Err(_) => serde_json::Value::String(raw.to_string()),
                };
                map.insert(key.clone(), value);
            }
            Ok(Some(serde_json::Value::Object(map)))
        }
    }

    // Kept for parity with a potential future `rewind()` API; currently
    // unused because `Reader::open` re-reads the header on loop restart.
    #[allow(dead_code)]
    fn rewind(reader: &mut BufReader<File>) -> std::io::Result<()> {
        reader.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn jsonl_sampler_reads_each_line_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"ts_ms": 0, "lat": 1.0}}"#).unwrap();
        writeln!(file, r#"{{"ts_ms": 1, "lat": 2.0}}"#).unwrap();
        drop(file);

        let mut sampler = JsonlSensorSampler::new(&path, false).unwrap();
        assert_eq!(sampler.next_sample().unwrap().unwrap().lat, 1.0);
        assert_eq!(sampler.next_sample().unwrap().unwrap().lat, 2.0);
        assert!(sampler.next_sample().unwrap().is_none());
    }

    #[test]
    fn jsonl_sampler_loops_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"ts_ms": 0, "lat": 1.0}}"#).unwrap();
        drop(file);

        let mut sampler = JsonlSensorSampler::new(&path, true).unwrap();
        assert_eq!(sampler.next_sample().unwrap().unwrap().lat, 1.0);
        assert_eq!(sampler.next_sample().unwrap().unwrap().lat, 1.0);
    }

    #[test]
    fn csv_sampler_reads_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "ts_ms,lat,lon").unwrap();
        writeln!(file, "0,1.0,2.0").unwrap();
        drop(file);

        let mut sampler = CsvSensorSampler::new(&path, false).unwrap();
        let sample = sampler.next_sample().unwrap().unwrap();
        assert_eq!(sample.lat, 1.0);
        assert_eq!(sample.lon, 2.0);
        assert!(sampler.next_sample().unwrap().is_none());
    }
}
