//! Offline aggregation over a run's JSONL event log: delivery ratios, ARQ
//! cost, and summary statistics over several numeric fields.

use std::collections::HashSet;

use serde_json::Value;

/// `count/min/p50/p90/max/mean` over one numeric field across all events
/// that carry it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummaryStats {
    pub count: usize,
    pub min: f64,
    pub p50: f64,
    pub p90: f64,
    pub max: f64,
    pub mean: f64,
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn summary_stats(values: &mut Vec<f64>) -> SummaryStats {
    if values.is_empty() {
        return SummaryStats::default();
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = values.len();
    let sum: f64 = values.iter().sum();
    SummaryStats {
        count,
        min: values[0],
        p50: quantile(values, 0.5),
        p90: quantile(values, 0.9),
        max: values[count - 1],
        mean: sum / count as f64,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunMetrics {
    pub sent_count: u64,
    pub acked_count: u64,
    pub failed_count: u64,
    pub rx_ok_count: u64,
    pub rx_parse_fail_count: u64,
    pub ack_sent_count: u64,
    pub ack_recv_event_count: u64,
    pub unique_windows_sent: u64,
    pub delivered_windows: u64,
    pub delivery_ratio: f64,
    pub retries: u64,
    pub pdr: f64,
    pub etx: f64,
    pub total_toa_ms: f64,
    pub toa_ms_est: SummaryStats,
    pub payload_bytes: SummaryStats,
    pub ack_rtt_ms: SummaryStats,
    pub rssi_dbm: SummaryStats,
    pub recon_mae: SummaryStats,
    pub recon_mse: SummaryStats,
}

fn event_name(event: &Value) -> Option<&str> {
    event.get("event").and_then(|v| v.as_str())
}

fn field_f64(event: &Value, key: &str) -> Option<f64> {
    event.get(key).and_then(|v| v.as_f64())
}

fn field_u64(event: &Value, key: &str) -> Option<u64> {
    event.get(key).and_then(|v| v.as_u64())
}

/// Aggregates a flat list of parsed JSONL events (TX and RX logs merged, or
/// a single side) into the metrics used by Phase 0/1 experiment selection.
pub fn compute_metrics(events: &[Value]) -> RunMetrics {
    let mut metrics = RunMetrics::default();
    let mut windows_sent: HashSet<u64> = HashSet::new();
    let mut windows_delivered: HashSet<u64> = HashSet::new();
    let mut toa_ms_est = Vec::new();
    let mut payload_bytes = Vec::new();
    let mut ack_rtt_ms = Vec::new();
    let mut rssi_dbm = Vec::new();
    let mut recon_mae = Vec::new();
    let mut recon_mse = Vec::new();

    for event in events {
        match event_name(event) {
            Some("tx_sent") => {
                metrics.sent_count += 1;
                if let Some(attempt) = field_u64(event, "attempt") {
                    if attempt > 1 {
                        metrics.retries += 1;
                    }
                }
                if let Some(window_id) = field_u64(event, "window_id") {
                    windows_sent.insert(window_id);
                }
                if let Some(v) = field_f64(event, "toa_ms_est") {
                    toa_ms_est.push(v);
                    metrics.total_toa_ms += v;
                }
                if let Some(v) = field_f64(event, "payload_bytes") {
                    payload_bytes.push(v);
                }
            }
            Some("ack_received") => {
                metrics.acked_count += 1;
                metrics.ack_recv_event_count += 1;
                if let Some(window_id) = field_u64(event, "window_id") {
                    windows_delivered.insert(window_id);
                }
                if let Some(v) = field_f64(event, "rtt_ms") {
                    ack_rtt_ms.push(v);
                }
                if let Some(v) = field_f64(event, "rssi_dbm") {
                    rssi_dbm.push(v);
                }
            }
            Some("tx_failed") => metrics.failed_count += 1,
            Some("rx_ok") => {
                metrics.rx_ok_count += 1;
                if let Some(v) = field_f64(event, "rssi_dbm") {
                    rssi_dbm.push(v);
                }
            }
            Some("rx_parse_fail") => metrics.rx_parse_fail_count += 1,
            Some("ack_sent") => metrics.ack_sent_count += 1,
            Some("recon_done") => {
                if let Some(v) = field_f64(event, "mae") {
                    recon_mae.push(v);
                }
                if let Some(v) = field_f64(event, "mse") {
                    recon_mse.push(v);
                }
            }
            _ => {}
        }
    }

    metrics.unique_windows_sent = windows_sent.len() as u64;
    metrics.delivered_windows = windows_delivered.len() as u64;
    metrics.delivery_ratio = if metrics.unique_windows_sent > 0 {
        metrics.delivered_windows as f64 / metrics.unique_windows_sent as f64
    } else {
        0.0
    };
    metrics.pdr = if metrics.sent_count > 0 {
        metrics.acked_count as f64 / metrics.sent_count as f64
    } else {
        0.0
    };
    metrics.etx = metrics.sent_count as f64 / metrics.acked_count.max(1) as f64;

    metrics.toa_ms_est = summary_stats(&mut toa_ms_est);
    metrics.payload_bytes = summary_stats(&mut payload_bytes);
    metrics.ack_rtt_ms = summary_stats(&mut ack_rtt_ms);
    metrics.rssi_dbm = summary_stats(&mut rssi_dbm);
    metrics.recon_mae = summary_stats(&mut recon_mae);
    metrics.recon_mse = summary_stats(&mut recon_mse);
    metrics
}
