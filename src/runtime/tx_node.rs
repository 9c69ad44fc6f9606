//! TX-side pipeline: sample -> window -> preprocess -> encode -> airtime-
//! gated ARQ send.
//!
//! The `process_once()` step order is load-bearing: queue a window from
//! the sampler, drain any incoming ACKs, retry/fail anything past its ACK
//! timeout, then send whatever the gate allows.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::{json, Map};

use crate::codec::Codec;
use crate::config::artifacts::ArtifactsManifest;
use crate::config::runspec::{AckTimeout, PhySpec, RunSpec};
use crate::error::{CodecError, ConfigError};
use crate::phy::airtime;
use crate::protocol::Packet;
use crate::radio::{Radio, RxRssi};
use crate::runtime::{Clock, JsonlLogger, TxGate};
use crate::sensing::dataset::DatasetLogger;
use crate::sensing::SensorSampler;

/// Rolling window of the last `w` samples, emitting a flattened window every
/// `stride` samples once full.
pub struct WindowBuilder {
    dims: usize,
    w: usize,
    stride: usize,
    buffer: VecDeque<Vec<f64>>,
    samples_seen: u64,
}

impl WindowBuilder {
    pub fn new(dims: usize, w: usize, stride: usize) -> Self {
        Self {
            dims,
            w,
            stride,
            buffer: VecDeque::with_capacity(w),
            samples_seen: 0,
        }
    }

    pub fn feed(&mut self, sample: &[f64]) -> Result<Option<Vec<f64>>, CodecError> {
        if sample.len() != self.dims {
            return Err(CodecError::InvalidInput(format!(
                "sample has {} dims, window expects {}",
                sample.len(),
                self.dims
            )));
        }
        self.buffer.push_back(sample.to_vec());
        if self.buffer.len() > self.w {
            self.buffer.pop_front();
        }
        self.samples_seen += 1;

        let ready = self.buffer.len() == self.w
            && (self.samples_seen - self.w as u64) % self.stride as u64 == 0;
        if ready {
            let flat: Vec<f64> = self.buffer.iter().flat_map(|s| s.iter().copied()).collect();
            Ok(Some(flat))
        } else {
            Ok(None)
        }
    }
}

/// Per-channel z-score normalisation. A zero standard deviation yields
/// exactly `0.0`, never a divide.
#[derive(Debug, Clone, PartialEq)]
pub struct NormParams {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl NormParams {
    pub fn apply(&self, window: &[f64]) -> Vec<f64> {
        window
            .iter()
            .zip(&self.mean)
            .zip(&self.std)
            .map(|((&x, &mean), &std)| if std == 0.0 { 0.0 } else { (x - mean) / std })
            .collect()
    }
}

/// Wraps an optional `NormParams`; a no-op when none is configured.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    norm: Option<NormParams>,
}

impl Preprocessor {
    pub fn new(norm: Option<NormParams>) -> Self {
        Self { norm }
    }

    pub fn apply(&self, window: &[f64]) -> Vec<f64> {
        match &self.norm {
            Some(norm) => norm.apply(window),
            None => window.to_vec(),
        }
    }
}

/// A window that has been encoded and is waiting for an available send slot.
#[derive(Debug, Clone, PartialEq)]
struct PendingWindow {
    window_id: u64,
    payload: Vec<u8>,
    /// Node-clock time the window finished encoding and was queued.
    built_at_ms: u64,
    /// Timestamp carried by the sample that completed the window.
    sensor_ts_ms: i64,
    /// Wall-clock time `codec.encode` took, independent of the simulated
    /// node clock.
    codec_encode_ms: f64,
}

/// Per-sequence-number bookkeeping carried from first send through to ACK
/// or failure, so retries and the final `ack_received`/`tx_failed` event
/// can still report the window's original build time and encode cost.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SeqMeta {
    built_at_ms: u64,
    sensor_ts_ms: i64,
    codec_encode_ms: f64,
}

pub struct TxNode {
    sampler: Box<dyn SensorSampler + Send>,
    window_builder: WindowBuilder,
    preprocessor: Preprocessor,
    codec: Box<dyn Codec + Send + Sync>,
    radio: Box<dyn Radio + Send>,
    rssi: Option<Box<dyn RxRssi + Send>>,
    clock: Arc<Mutex<dyn Clock>>,
    gate: TxGate,
    logger: JsonlLogger,
    dataset_logger: Option<DatasetLogger>,
    phy: PhySpec,
    max_payload_bytes: usize,
    guard_ms: u64,
    ack_timeout: AckTimeout,
    max_windows: Option<u64>,
    pending: VecDeque<PendingWindow>,
    next_window_id: u64,
    seq_counter: u8,
    seq_frames: HashMap<u8, Vec<u8>>,
    seq_windows: HashMap<u8, u64>,
    seq_meta: HashMap<u8, SeqMeta>,
    sampler_exhausted: bool,
}

impl TxNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sampler: Box<dyn SensorSampler + Send>,
        window_builder: WindowBuilder,
        preprocessor: Preprocessor,
        codec: Box<dyn Codec + Send + Sync>,
        radio: Box<dyn Radio + Send>,
        rssi: Option<Box<dyn RxRssi + Send>>,
        clock: Arc<Mutex<dyn Clock>>,
        phy: PhySpec,
        max_payload_bytes: usize,
        guard_ms: u64,
        ack_timeout: AckTimeout,
        max_retries: u32,
        max_inflight: usize,
        max_windows: Option<u64>,
        logger: JsonlLogger,
        dataset_logger: Option<DatasetLogger>,
    ) -> Self {
        Self {
            sampler,
            window_builder,
            preprocessor,
            codec,
            radio,
            rssi,
            clock,
            gate: TxGate::new(max_inflight, guard_ms, max_retries),
            logger,
            dataset_logger,
            phy,
            max_payload_bytes,
            guard_ms,
            ack_timeout,
            max_windows,
            pending: VecDeque::new(),
            next_window_id: 0,
            seq_counter: 0,
            seq_frames: HashMap::new(),
            seq_windows: HashMap::new(),
            seq_meta: HashMap::new(),
            sampler_exhausted: false,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.lock().expect("clock mutex poisoned").now_ms()
    }

    /// Logs the mandatory `run_start` event once, before the first
    /// `process_once` call.
    pub fn log_run_start(
        &mut self,
        runspec: &RunSpec,
        manifest: Option<&ArtifactsManifest>,
    ) -> Result<(), ConfigError> {
        let now = self.now_ms();
        self.logger.log_run_start(&FakeNow(now), runspec, manifest)
    }

    fn resolve_ack_timeout_ms(&self, frame_bytes: usize) -> u64 {
        match self.ack_timeout {
            AckTimeout::Fixed(ms) => ms as u64,
            AckTimeout::Auto => {
                airtime::estimate_ack_timeout_ms(&self.phy, frame_bytes, None, None).unwrap_or(u32::MAX) as u64
            }
        }
    }

    /// Pulls one sample from the sampler and, if a window completes,
    /// preprocesses + encodes it into a pending send.
    fn queue_window(&mut self) -> Result<(), ConfigError> {
        if self.sampler_exhausted {
            return Ok(());
        }
        if let Some(max) = self.max_windows {
            if self.next_window_id >= max {
                return Ok(());
            }
        }
        let sample = self
            .sampler
            .next_sample()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let Some(sample) = sample else {
            self.sampler_exhausted = true;
            return Ok(());
        };
        let sensor_ts_ms = sample.ts_ms;
        let window = self
            .window_builder
            .feed(&sample.vector())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(window) = window {
            let built_at_ms = self.now_ms();
            let window_id = self.next_window_id;
            if let Some(dataset_logger) = &mut self.dataset_logger {
                dataset_logger.log_window(window_id, built_at_ms, &window)?;
            }
            let normed = self.preprocessor.apply(&window);
            let encode_start = Instant::now();
            let payload = self
                .codec
                .encode(&normed)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            let codec_encode_ms = encode_start.elapsed().as_secs_f64() * 1000.0;
            self.next_window_id += 1;
            self.pending.push_back(PendingWindow {
                window_id,
                payload,
                built_at_ms,
                sensor_ts_ms,
                codec_encode_ms,
            });
        }
        Ok(())
    }

    /// Drains any ACK frames the radio has delivered and updates the gate.
    fn handle_incoming(&mut self) -> Result<(), ConfigError> {
        let now = self.now_ms();
        while let Some(frame) = self
            .radio
            .recv(0)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
        {
            let rssi_dbm = self.rssi.as_ref().and_then(|r| r.last_rx_rssi_dbm());
            match Packet::from_bytes(&frame, Some(self.max_payload_bytes)) {
                Err(err) => {
                    let mut fields = Map::new();
                    fields.insert("reason".into(), json!(err.to_string()));
                    self.logger
                        .log_event(&FakeNow(now), "rx_parse_fail", fields)?;
                }
                Ok(packet) => {
                    if let Some(&ack_seq) = packet.payload.first() {
                        if let Some(entry) = self.gate.mark_acked(ack_seq) {
                            let rtt_ms = now.saturating_sub(entry.last_tx_ms);
                            let window_id = self.seq_windows.remove(&ack_seq);
                            let meta = self.seq_meta.remove(&ack_seq);
                            let mut fields = Map::new();
                            fields.insert("ack_seq".into(), json!(ack_seq));
                            if let Some(window_id) = window_id {
                                fields.insert("window_id".into(), json!(window_id));
                            }
                            fields.insert("rtt_ms".into(), json!(rtt_ms));
                            if let Some(meta) = meta {
                                let queue_ms = entry.first_tx_ms.saturating_sub(meta.built_at_ms);
                                let e2e_ms = now.saturating_sub(meta.built_at_ms);
                                fields.insert("queue_ms".into(), json!(queue_ms));
                                fields.insert("e2e_ms".into(), json!(e2e_ms));
                                fields.insert("codec_encode_ms".into(), json!(meta.codec_encode_ms));
                                fields.insert("sensor_ts_ms".into(), json!(meta.sensor_ts_ms));
                            }
                            if let Some(rssi_dbm) = rssi_dbm {
                                fields.insert("rssi_dbm".into(), json!(rssi_dbm));
                            }
                            self.seq_frames.remove(&ack_seq);
                            self.logger.log_event(&FakeNow(now), "ack_received", fields)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Resends anything past its ACK timeout with retries remaining, and
    /// gives up permanently on anything that has exhausted them.
    ///
    /// The ACK timeout is resolved per sequence number from that sequence's
    /// own frame length, not from one value shared across every inflight
    /// entry: with `max_inflight > 1` those frames can differ in length.
    fn retry_expired(&mut self) -> Result<(), ConfigError> {
        let now = self.now_ms();
        let frames_snapshot = self.seq_frames.clone();
        let phy = self.phy;
        let ack_timeout = self.ack_timeout;
        let ack_timeout_for = move |seq: u8| match frames_snapshot.get(&seq) {
            Some(frame) => match ack_timeout {
                AckTimeout::Fixed(ms) => ms as u64,
                AckTimeout::Auto => {
                    airtime::estimate_ack_timeout_ms(&phy, frame.len(), None, None)
                        .unwrap_or(u32::MAX) as u64
                }
            },
            None => u64::MAX,
        };

        let expired: Vec<u8> = self.gate.expired_sequences(now, &ack_timeout_for);
        for seq in expired {
            if let Some(frame) = self.seq_frames.get(&seq).cloned() {
                let toa_ms_est = airtime::estimate_toa_ms(&self.phy, frame.len()).unwrap_or(0.0);
                let attempt = self.gate.record_send(now, seq, toa_ms_est);
                self.radio
                    .send(&frame)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                let window_id = self.seq_windows.get(&seq).copied();
                let meta = self.seq_meta.get(&seq).copied();
                let ack_timeout_ms = ack_timeout_for(seq);
                let mut fields = Map::new();
                fields.insert("window_id".into(), json!(window_id));
                fields.insert("seq".into(), json!(seq));
                fields.insert("payload_bytes".into(), json!(frame.len()));
                fields.insert("frame_bytes".into(), json!(frame.len()));
                fields.insert("toa_ms_est".into(), json!(toa_ms_est));
                fields.insert("guard_ms".into(), json!(self.guard_ms));
                fields.insert("attempt".into(), json!(attempt));
                fields.insert("ack_timeout_ms".into(), json!(ack_timeout_ms));
                if let Some(meta) = meta {
                    fields.insert("age_ms".into(), json!(now.saturating_sub(meta.built_at_ms)));
                    fields.insert("codec_encode_ms".into(), json!(meta.codec_encode_ms));
                    fields.insert("sensor_ts_ms".into(), json!(meta.sensor_ts_ms));
                }
                self.logger.log_event(&FakeNow(now), "tx_sent", fields)?;
            }
        }

        for failure in self.gate.expired_failures(now, &ack_timeout_for) {
            self.seq_frames.remove(&failure.seq);
            self.seq_meta.remove(&failure.seq);
            let window_id = self.seq_windows.remove(&failure.seq);
            let mut fields = Map::new();
            fields.insert("seq".into(), json!(failure.seq));
            fields.insert("reason".into(), json!("max_retries_exceeded"));
            fields.insert("attempts".into(), json!(failure.attempts));
            if let Some(window_id) = window_id {
                fields.insert("window_id".into(), json!(window_id));
            }
            self.logger.log_event(&FakeNow(now), "tx_failed", fields)?;
        }
        Ok(())
    }

    /// Sends pending windows while the gate allows it.
    fn send_pending(&mut self) -> Result<(), ConfigError> {
        loop {
            let now = self.now_ms();
            if !self.gate.can_send(now) || self.pending.is_empty() {
                break;
            }
            let pending = self.pending.pop_front().unwrap();
            let seq = self.seq_counter;
            self.seq_counter = self.seq_counter.wrapping_add(1);
            let packet = Packet::new(pending.payload.clone(), seq);
            let frame = packet
                .to_bytes(Some(self.max_payload_bytes))
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            let toa_ms_est = airtime::estimate_toa_ms(&self.phy, frame.len()).unwrap_or(0.0);
            let attempt = self.gate.record_send(now, seq, toa_ms_est);
            self.radio
                .send(&frame)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            self.seq_frames.insert(seq, frame.clone());
            self.seq_windows.insert(seq, pending.window_id);
            self.seq_meta.insert(
                seq,
                SeqMeta {
                    built_at_ms: pending.built_at_ms,
                    sensor_ts_ms: pending.sensor_ts_ms,
                    codec_encode_ms: pending.codec_encode_ms,
                },
            );
            let ack_timeout_ms = self.resolve_ack_timeout_ms(frame.len());

            let mut fields = Map::new();
            fields.insert("window_id".into(), json!(pending.window_id));
            fields.insert("seq".into(), json!(seq));
            fields.insert("payload_bytes".into(), json!(pending.payload.len()));
            fields.insert("frame_bytes".into(), json!(frame.len()));
            fields.insert("toa_ms_est".into(), json!(toa_ms_est));
            fields.insert("guard_ms".into(), json!(self.guard_ms));
            fields.insert("attempt".into(), json!(attempt));
            fields.insert("ack_timeout_ms".into(), json!(ack_timeout_ms));
            fields.insert("age_ms".into(), json!(now.saturating_sub(pending.built_at_ms)));
            fields.insert("codec_encode_ms".into(), json!(pending.codec_encode_ms));
            fields.insert("sensor_ts_ms".into(), json!(pending.sensor_ts_ms));
            self.logger.log_event(&FakeNow(now), "tx_sent", fields)?;
        }
        Ok(())
    }

    pub fn process_once(&mut self) -> Result<(), ConfigError> {
        self.queue_window()?;
        self.handle_incoming()?;
        self.retry_expired()?;
        self.send_pending()?;
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        let exhausted = match self.max_windows {
            Some(max) => self.next_window_id >= max,
            None => self.sampler_exhausted,
        };
        exhausted && self.pending.is_empty() && self.gate.inflight().is_empty()
    }
}

/// A `Clock` wrapper returning a fixed value, so event logging can stamp
/// `ts_ms` without re-locking the shared clock mid-step.
struct FakeNow(u64);

impl Clock for FakeNow {
    fn now_ms(&self) -> u64 {
        self.0
    }
    fn sleep_ms(&mut self, _ms: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_builder_emits_after_w_samples() {
        let mut builder = WindowBuilder::new(2, 2, 1);
        assert!(builder.feed(&[1.0, 2.0]).unwrap().is_none());
        let window = builder.feed(&[3.0, 4.0]).unwrap().unwrap();
        assert_eq!(window, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn window_builder_respects_stride() {
        let mut builder = WindowBuilder::new(1, 2, 2);
        assert!(builder.feed(&[1.0]).unwrap().is_none());
        assert!(builder.feed(&[2.0]).unwrap().is_some());
        assert!(builder.feed(&[3.0]).unwrap().is_none());
        assert!(builder.feed(&[4.0]).unwrap().is_some());
    }

    #[test]
    fn window_builder_rejects_wrong_dims() {
        let mut builder = WindowBuilder::new(2, 2, 1);
        assert!(builder.feed(&[1.0]).is_err());
    }

    #[test]
    fn norm_params_zero_std_yields_zero_not_divide_by_zero() {
        let norm = NormParams {
            mean: vec![1.0],
            std: vec![0.0],
        };
        assert_eq!(norm.apply(&[5.0]), vec![0.0]);
    }

    #[test]
    fn norm_params_applies_zscore() {
        let norm = NormParams {
            mean: vec![10.0],
            std: vec![2.0],
        };
        assert_eq!(norm.apply(&[12.0]), vec![1.0]);
    }

    #[test]
    fn preprocessor_passthrough_without_norm() {
        let pre = Preprocessor::new(None);
        assert_eq!(pre.apply(&[1.0, 2.0]), vec![1.0, 2.0]);
    }
}
