//! Canonical 12-channel sensor sample: GPS position, accelerometer,
//! gyroscope, attitude. Accepts several real-world nested JSON shapes and
//! flattens them to a fixed channel order.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::CodecError;

/// Fixed channel order every flattened sample vector follows.
pub const SENSOR_ORDER: [&str; 12] = [
    "lat", "lon", "alt", "ax", "ay", "az", "gx", "gy", "gz", "roll", "pitch", "yaw",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub ts_ms: i64,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

fn coerce_float(value: &Value, field: &str) -> Result<f64, CodecError> {
    value
        .as_f64()
        .ok_or_else(|| CodecError::InvalidInput(format!("field {field} is not numeric")))
}

fn coerce_ts_ms(obj: &serde_json::Map<String, Value>) -> Result<i64, CodecError> {
    if let Some(v) = obj.get("ts_ms") {
        return v
            .as_i64()
            .ok_or_else(|| CodecError::InvalidInput("ts_ms must be an integer".into()));
    }
    if let Some(v) = obj.get("ts") {
        let secs = v
            .as_f64()
            .ok_or_else(|| CodecError::InvalidInput("ts must be numeric seconds".into()))?;
        return Ok((secs * 1000.0).round() as i64);
    }
    if let Some(v) = obj.get("timestamp") {
        let raw = v
            .as_str()
            .ok_or_else(|| CodecError::InvalidInput("timestamp must be a string".into()))?;
        let normalized = raw.replace('Z', "+00:00");
        let parsed = DateTime::parse_from_rfc3339(&normalized).or_else(|_| {
            NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).into())
        });
        let parsed = parsed
            .map_err(|e| CodecError::InvalidInput(format!("invalid timestamp {raw:?}: {e}")))?;
        return Ok(parsed.timestamp_millis());
    }
    Err(CodecError::InvalidInput(
        "sample must carry one of ts_ms, ts, timestamp".into(),
    ))
}

fn extract_flat_fields(obj: &serde_json::Map<String, Value>) -> Result<[f64; 12], CodecError> {
    let mut out = [0.0f64; 12];

    if let Some(Value::Object(gps)) = obj.get("gps") {
        out[0] = coerce_float(gps.get("lat").unwrap_or(&Value::Null), "gps.lat")?;
        out[1] = coerce_float(gps.get("lon").unwrap_or(&Value::Null), "gps.lon")?;
        out[2] = gps
            .get("alt")
            .or_else(|| gps.get("altitude"))
            .map(|v| coerce_float(v, "gps.alt"))
            .transpose()?
            .unwrap_or(0.0);
    } else {
        out[0] = obj.get("lat").map(|v| coerce_float(v, "lat")).transpose()?.unwrap_or(0.0);
        out[1] = obj.get("lon").map(|v| coerce_float(v, "lon")).transpose()?.unwrap_or(0.0);
        out[2] = obj.get("alt").map(|v| coerce_float(v, "alt")).transpose()?.unwrap_or(0.0);
    }

    if let Some(Value::Object(accel)) = obj.get("accel") {
        out[3] = coerce_float(accel.get("ax").unwrap_or(&Value::Null), "accel.ax")?;
        out[4] = coerce_float(accel.get("ay").unwrap_or(&Value::Null), "accel.ay")?;
        out[5] = coerce_float(accel.get("az").unwrap_or(&Value::Null), "accel.az")?;
    } else {
        out[3] = obj.get("ax").map(|v| coerce_float(v, "ax")).transpose()?.unwrap_or(0.0);
        out[4] = obj.get("ay").map(|v| coerce_float(v, "ay")).transpose()?.unwrap_or(0.0);
        out[5] = obj.get("az").map(|v| coerce_float(v, "az")).transpose()?.unwrap_or(0.0);
    }

    if let Some(Value::Object(gyro)) = obj.get("gyro") {
        out[6] = coerce_float(gyro.get("gx").unwrap_or(&Value::Null), "gyro.gx")?;
        out[7] = coerce_float(gyro.get("gy").unwrap_or(&Value::Null), "gyro.gy")?;
        out[8] = coerce_float(gyro.get("gz").unwrap_or(&Value::Null), "gyro.gz")?;
    } else {
        out[6] = obj.get("gx").map(|v| coerce_float(v, "gx")).transpose()?.unwrap_or(0.0);
        out[7] = obj.get("gy").map(|v| coerce_float(v, "gy")).transpose()?.unwrap_or(0.0);
        out[8] = obj.get("gz").map(|v| coerce_float(v, "gz")).transpose()?.unwrap_or(0.0);
    }

    // `attitude` is the base nested shape; `angle` overrides it if both are
    // present (checked second, matching the original's field precedence).
    if let Some(Value::Object(attitude)) = obj.get("attitude") {
        out[9] = coerce_float(attitude.get("roll").unwrap_or(&Value::Null), "attitude.roll")?;
        out[10] = coerce_float(attitude.get("pitch").unwrap_or(&Value::Null), "attitude.pitch")?;
        out[11] = coerce_float(attitude.get("yaw").unwrap_or(&Value::Null), "attitude.yaw")?;
    }
    if let Some(Value::Object(angle)) = obj.get("angle") {
        out[9] = coerce_float(angle.get("roll").unwrap_or(&Value::Null), "angle.roll")?;
        out[10] = coerce_float(angle.get("pitch").unwrap_or(&Value::Null), "angle.pitch")?;
        out[11] = coerce_float(angle.get("yaw").unwrap_or(&Value::Null), "angle.yaw")?;
    }
    if obj.get("attitude").is_none() && obj.get("angle").is_none() {
        out[9] = obj.get("roll").map(|v| coerce_float(v, "roll")).transpose()?.unwrap_or(0.0);
        out[10] = obj.get("pitch").map(|v| coerce_float(v, "pitch")).transpose()?.unwrap_or(0.0);
        out[11] = obj.get("yaw").map(|v| coerce_float(v, "yaw")).transpose()?.unwrap_or(0.0);
    }

    Ok(out)
}

impl SensorSample {
    pub fn from_json(value: &Value) -> Result<Self, CodecError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CodecError::InvalidInput("sample must be a JSON object".into()))?;
        let ts_ms = coerce_ts_ms(obj)?;
        let v = extract_flat_fields(obj)?;
        Ok(SensorSample {
            ts_ms,
            lat: v[0],
            lon: v[1],
            alt: v[2],
            ax: v[3],
            ay: v[4],
            az: v[5],
            gx: v[6],
            gy: v[7],
            gz: v[8],
            roll: v[9],
            pitch: v[10],
            yaw: v[11],
        })
    }

    /// Flattens to the canonical 12-value vector in `SENSOR_ORDER`.
    pub fn vector(&self) -> [f64; 12] {
        [
            self.lat, self.lon, self.alt, self.ax, self.ay, self.az, self.gx, self.gy, self.gz,
            self.roll, self.pitch, self.yaw,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flat_fields_with_ts_ms() {
        let sample = SensorSample::from_json(&json!({
            "ts_ms": 1000, "lat": 1.0, "lon": 2.0, "ax": 0.1
        }))
        .unwrap();
        assert_eq!(sample.ts_ms, 1000);
        assert_eq!(sample.lat, 1.0);
        assert_eq!(sample.ax, 0.1);
    }

    #[test]
    fn parses_nested_gps_accel_gyro_attitude() {
        let sample = SensorSample::from_json(&json!({
            "ts_ms": 0,
            "gps": {"lat": 10.0, "lon": 20.0, "altitude": 5.0},
            "accel": {"ax": 0.1, "ay": 0.2, "az": 0.3},
            "gyro": {"gx": 1.0, "gy": 2.0, "gz": 3.0},
            "attitude": {"roll": 0.5, "pitch": 0.6, "yaw": 0.7}
        }))
        .unwrap();
        assert_eq!(sample.lat, 10.0);
        assert_eq!(sample.alt, 5.0);
        assert_eq!(sample.gz, 3.0);
        assert_eq!(sample.yaw, 0.7);
    }

    #[test]
    fn angle_overrides_attitude_when_both_present() {
        let sample = SensorSample::from_json(&json!({
            "ts_ms": 0,
            "attitude": {"roll": 0.1, "pitch": 0.1, "yaw": 0.1},
            "angle": {"roll": 9.0, "pitch": 9.0, "yaw": 9.0}
        }))
        .unwrap();
        assert_eq!(sample.roll, 9.0);
    }

    #[test]
    fn parses_ts_seconds_field() {
        let sample = SensorSample::from_json(&json!({"ts": 1.5})).unwrap();
        assert_eq!(sample.ts_ms, 1500);
    }

    #[test]
    fn parses_iso_timestamp_with_z_suffix() {
        let sample = SensorSample::from_json(&json!({"timestamp": "2026-01-01T00:00:00Z"})).unwrap();
        assert!(sample.ts_ms > 0);
    }

    #[test]
    fn rejects_missing_timestamp_field() {
        assert!(SensorSample::from_json(&json!({"lat": 1.0})).is_err());
    }

    #[test]
    fn vector_matches_sensor_order() {
        let sample = SensorSample::from_json(&json!({"ts_ms": 0, "lat": 1.0, "yaw": 9.0})).unwrap();
        let v = sample.vector();
        assert_eq!(v[0], 1.0);
        assert_eq!(v[11], 9.0);
    }
}
