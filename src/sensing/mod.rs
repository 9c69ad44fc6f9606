//! Sensor ingest: canonical sample schema, file-backed samplers, and the
//! dataset sidecar log.

pub mod dataset;
pub mod sampler;
pub mod schema;

pub use dataset::DatasetLogger;
pub use sampler::{CsvSensorSampler, JsonlSensorSampler, SensorSampler};
pub use schema::{SensorSample, SENSOR_ORDER};
