//! End-to-end TX/RX scenarios over `MockLink`, covering the seven concrete
//! scenarios in `spec.md` §8.

use std::sync::{Arc, Mutex};

use lorarelay_rs::codec::raw::RawCodec;
use lorarelay_rs::config::runspec::{AckTimeout, Mode, PhySpec};
use lorarelay_rs::error::CodecError;
use lorarelay_rs::phy::airtime;
use lorarelay_rs::radio::mock::{MockLink, MockLinkConfig};
use lorarelay_rs::runtime::{Clock, FakeClock, JsonlLogger, RxNode, TxNode};
use lorarelay_rs::runtime::tx_node::{Preprocessor, WindowBuilder};
use lorarelay_rs::sensing::{SensorSample, SensorSampler};

/// Yields a fixed queue of samples, then `None` forever.
struct FixedSampler {
    samples: Vec<SensorSample>,
    index: usize,
}

impl FixedSampler {
    fn new(samples: Vec<SensorSample>) -> Self {
        Self { samples, index: 0 }
    }
}

impl SensorSampler for FixedSampler {
    fn next_sample(&mut self) -> Result<Option<SensorSample>, CodecError> {
        if self.index >= self.samples.len() {
            return Ok(None);
        }
        let sample = self.samples[self.index];
        self.index += 1;
        Ok(Some(sample))
    }
}

fn sample_from_vector(v: [f64; 12]) -> SensorSample {
    SensorSample {
        ts_ms: 0,
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
    }
}

fn reference_phy() -> PhySpec {
    PhySpec {
        sf: 7,
        bw_hz: 125_000,
        cr: 5,
        preamble: 8,
        crc_on: true,
        explicit_header: true,
        tx_power_dbm: 14,
        ldro: None,
    }
}

/// Reads back every JSON line in `path` as a `serde_json::Value`.
fn read_events(path: &std::path::Path) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn events_of_type<'a>(events: &'a [serde_json::Value], event: &str) -> Vec<&'a serde_json::Value> {
    events
        .iter()
        .filter(|e| e.get("event").and_then(|v| v.as_str()) == Some(event))
        .collect()
}

/// Wires a TX/RX pair over a `MockLink`, steps both `max_steps` times, and
/// returns the TX and RX event logs read back from disk.
#[allow(clippy::too_many_arguments)]
fn run_scenario(
    out_dir: &std::path::Path,
    samples: Vec<SensorSample>,
    window_dims: usize,
    window_w: usize,
    codec_maker: impl Fn() -> Box<dyn lorarelay_rs::codec::Codec + Send + Sync>,
    link_config: MockLinkConfig,
    guard_ms: u64,
    ack_timeout_ms: u32,
    max_retries: u32,
    max_inflight: usize,
    max_steps: u32,
) -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
    let clock: Arc<Mutex<dyn Clock>> = Arc::new(Mutex::new(FakeClock::new()));
    let (radio_tx, radio_rx) = MockLink::new(link_config, clock.clone());

    let phy = reference_phy();
    let tx_logger = JsonlLogger::new(out_dir, "run", "tx", "RAW", &phy.profile_id()).unwrap();
    let rx_logger = JsonlLogger::new(out_dir, "run", "rx", "RAW", &phy.profile_id()).unwrap();

    let mut tx = TxNode::new(
        Box::new(FixedSampler::new(samples)),
        WindowBuilder::new(window_dims, window_w, window_w),
        Preprocessor::new(None),
        codec_maker(),
        Box::new(radio_tx),
        None,
        clock.clone(),
        phy,
        255,
        guard_ms,
        AckTimeout::Fixed(ack_timeout_ms),
        max_retries,
        max_inflight,
        Some(1),
        tx_logger,
        None,
    );
    let mut rx = RxNode::new(
        Box::new(radio_rx),
        None,
        clock.clone(),
        None,
        Mode::Raw,
        255,
        rx_logger,
        None,
    );

    for _ in 0..max_steps {
        tx.process_once().unwrap();
        rx.process_once().unwrap();
        if tx.is_done() {
            break;
        }
        clock.lock().unwrap().sleep_ms(1);
    }

    let tx_path = out_dir.join("run_tx.jsonl");
    let rx_path = out_dir.join("run_rx.jsonl");
    (read_events(&tx_path), read_events(&rx_path))
}

#[test]
fn scenario_1_raw_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sample = sample_from_vector([
        0.5, -0.5, 0.25, -0.25, 0.1, -0.1, 0.0, 1.0, -1.0, 0.333, -0.333, 0.9,
    ]);
    let (tx_events, _rx_events) = run_scenario(
        dir.path(),
        vec![sample],
        12,
        1,
        || Box::new(RawCodec::new(32767.0)),
        MockLinkConfig::default(),
        0,
        50,
        3,
        1,
        20,
    );

    let sent = events_of_type(&tx_events, "tx_sent");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["payload_bytes"].as_u64(), Some(24));

    let acked = events_of_type(&tx_events, "ack_received");
    assert_eq!(acked.len(), 1);
    assert_eq!(acked[0]["rtt_ms"].as_u64(), Some(0));
}

#[test]
fn scenario_4_airtime_monotonic_in_payload_length() {
    let phy = reference_phy();
    let short = airtime::estimate_toa_ms(&phy, 5).unwrap();
    let long = airtime::estimate_toa_ms(&phy, 20).unwrap();
    assert!(short < long);
}

#[test]
fn scenario_5_arq_retry_then_success() {
    let dir = tempfile::tempdir().unwrap();
    let sample = sample_from_vector([0.1; 12]);
    let link_config = MockLinkConfig {
        drop_pattern_ab: Some(vec![true, false]),
        drop_pattern_ba: Some(vec![false]),
        ..Default::default()
    };
    let (tx_events, _rx_events) = run_scenario(
        dir.path(),
        vec![sample],
        12,
        1,
        || Box::new(RawCodec::new(32767.0)),
        link_config,
        0,
        10,
        1,
        1,
        50,
    );

    let sent = events_of_type(&tx_events, "tx_sent");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["attempt"].as_u64(), Some(1));
    assert_eq!(sent[1]["attempt"].as_u64(), Some(2));

    let acked = events_of_type(&tx_events, "ack_received");
    assert_eq!(acked.len(), 1);

    let failed = events_of_type(&tx_events, "tx_failed");
    assert!(failed.is_empty());
}

#[test]
fn scenario_6_permanent_failure() {
    let dir = tempfile::tempdir().unwrap();
    let sample = sample_from_vector([0.1; 12]);
    let link_config = MockLinkConfig {
        drop_pattern_ab: Some(vec![true, true]),
        drop_pattern_ba: Some(vec![false]),
        ..Default::default()
    };
    let (tx_events, _rx_events) = run_scenario(
        dir.path(),
        vec![sample],
        12,
        1,
        || Box::new(RawCodec::new(32767.0)),
        link_config,
        0,
        10,
        1,
        1,
        50,
    );

    let sent = events_of_type(&tx_events, "tx_sent");
    assert_eq!(sent.len(), 2);

    let acked = events_of_type(&tx_events, "ack_received");
    assert!(acked.is_empty());

    let failed = events_of_type(&tx_events, "tx_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["reason"].as_str(), Some("max_retries_exceeded"));
    assert_eq!(failed[0]["attempts"].as_u64(), Some(2));
}

#[test]
fn rx_acks_every_parsed_frame_with_matching_data_seq() {
    let dir = tempfile::tempdir().unwrap();
    let sample = sample_from_vector([0.2; 12]);
    let (_tx_events, rx_events) = run_scenario(
        dir.path(),
        vec![sample],
        12,
        1,
        || Box::new(RawCodec::new(32767.0)),
        MockLinkConfig::default(),
        0,
        50,
        3,
        1,
        20,
    );

    let rx_ok = events_of_type(&rx_events, "rx_ok");
    let ack_sent = events_of_type(&rx_events, "ack_sent");
    assert_eq!(rx_ok.len(), 1);
    assert_eq!(ack_sent.len(), 1);
    assert_eq!(rx_ok[0]["seq"], ack_sent[0]["ack_seq"]);
}
