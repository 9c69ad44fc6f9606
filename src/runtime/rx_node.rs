//! RX-side pipeline: receive a frame, parse it, ACK it, and optionally
//! attempt latent-codec reconstruction.
//!
//! The `ack_sent` event's `ack_seq` field carries the *data* SEQ being
//! acknowledged (`packet.seq`), not this node's own rolling ACK-sequence
//! counter: the rolling counter is only ever used as the ACK packet's own
//! on-wire SEQ byte.

use std::sync::{Arc, Mutex};

use serde_json::{json, Map};

use crate::codec::Codec;
use crate::config::artifacts::ArtifactsManifest;
use crate::config::runspec::{Mode, RunSpec};
use crate::error::{CodecError, ConfigError};
use crate::protocol::Packet;
use crate::radio::{Radio, RxRssi};
use crate::runtime::{Clock, JsonlLogger};

/// Supplies ground truth for reconstruction-error logging during Phase 1
/// A/B experiments. Production RX nodes have none.
pub trait TruthProvider {
    fn truth_for(&self, seq: u8) -> Option<Vec<f64>>;
}

pub struct RxNode {
    radio: Box<dyn Radio + Send>,
    rssi: Option<Box<dyn RxRssi + Send>>,
    clock: Arc<Mutex<dyn Clock>>,
    codec: Option<Box<dyn Codec + Send + Sync>>,
    mode: Mode,
    max_payload_bytes: usize,
    logger: JsonlLogger,
    truth: Option<Box<dyn TruthProvider + Send>>,
    ack_seq: u8,
}

impl RxNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        radio: Box<dyn Radio + Send>,
        rssi: Option<Box<dyn RxRssi + Send>>,
        clock: Arc<Mutex<dyn Clock>>,
        codec: Option<Box<dyn Codec + Send + Sync>>,
        mode: Mode,
        max_payload_bytes: usize,
        logger: JsonlLogger,
        truth: Option<Box<dyn TruthProvider + Send>>,
    ) -> Self {
        Self {
            radio,
            rssi,
            clock,
            codec,
            mode,
            max_payload_bytes,
            logger,
            truth,
            ack_seq: 0,
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

    pub fn process_once(&mut self) -> Result<(), ConfigError> {
        let now = self.now_ms();
        let frame = self
            .radio
            .recv(0)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let Some(frame) = frame else {
            return Ok(());
        };
        let rssi_dbm = self.rssi.as_ref().and_then(|r| r.last_rx_rssi_dbm());

        let packet = match Packet::from_bytes(&frame, Some(self.max_payload_bytes)) {
            Err(err) => {
                let mut fields = Map::new();
                fields.insert("reason".into(), json!(err.to_string()));
                self.log(now, "rx_parse_fail", fields)?;
                return Ok(());
            }
            Ok(packet) => packet,
        };

        let mut rx_ok_fields = Map::new();
        rx_ok_fields.insert("seq".into(), json!(packet.seq));
        rx_ok_fields.insert("payload_bytes".into(), json!(packet.payload.len()));
        rx_ok_fields.insert("frame_bytes".into(), json!(frame.len()));
        if let Some(rssi_dbm) = rssi_dbm {
            rx_ok_fields.insert("rssi_dbm".into(), json!(rssi_dbm));
        }
        self.log(now, "rx_ok", rx_ok_fields)?;

        if self.mode == Mode::Latent {
            self.try_reconstruct(now, &packet)?;
        }

        let ack_payload = vec![packet.seq];
        let ack_packet = Packet::new(ack_payload, self.ack_seq);
        let ack_frame = ack_packet
            .to_bytes(Some(self.max_payload_bytes))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.radio
            .send(&ack_frame)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut ack_fields = Map::new();
        ack_fields.insert("ack_seq".into(), json!(packet.seq));
        self.log(now, "ack_sent", ack_fields)?;

        self.ack_seq = self.ack_seq.wrapping_add(1);
        Ok(())
    }

    fn try_reconstruct(&mut self, now: u64, packet: &Packet) -> Result<(), ConfigError> {
        let Some(codec) = &self.codec else {
            let mut fields = Map::new();
            fields.insert("seq".into(), json!(packet.seq));
            fields.insert("reason".into(), json!("no codec configured"));
            return self.log(now, "recon_not_implemented", fields);
        };
        match codec.decode(&packet.payload) {
            Err(CodecError::NotImplemented(reason)) => {
                let mut fields = Map::new();
                fields.insert("seq".into(), json!(packet.seq));
                fields.insert("reason".into(), json!(reason));
                self.log(now, "recon_not_implemented", fields)
            }
            Err(err) => {
                let mut fields = Map::new();
                fields.insert("seq".into(), json!(packet.seq));
                fields.insert("reason".into(), json!(err.to_string()));
                self.log(now, "recon_failed", fields)
            }
            Ok(reconstructed) => {
                if let Some(truth) = &self.truth {
                    if let Some(truth_vec) = truth.truth_for(packet.seq) {
                        let (mae, mse) = mae_mse(&truth_vec, &reconstructed);
                        let mut fields = Map::new();
                        fields.insert("seq".into(), json!(packet.seq));
                        fields.insert("mae".into(), json!(mae));
                        fields.insert("mse".into(), json!(mse));
                        return self.log(now, "recon_done", fields);
                    }
                }
                Ok(())
            }
        }
    }

    fn log(&mut self, now: u64, event: &str, fields: Map<String, serde_json::Value>) -> Result<(), ConfigError> {
        self.logger.log_event(&FakeNow(now), event, fields)
    }
}

fn mae_mse(truth: &[f64], reconstructed: &[f64]) -> (f64, f64) {
    let n = truth.len().min(reconstructed.len()).max(1) as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    for (t, r) in truth.iter().zip(reconstructed.iter()) {
        let diff = t - r;
        abs_sum += diff.abs();
        sq_sum += diff * diff;
    }
    (abs_sum / n, sq_sum / n)
}

struct FakeNow(u64);

impl Clock for FakeNow {
    fn now_ms(&self) -> u64 {
        self.0
    }
    fn sleep_ms(&mut self, _ms: u64) {}
}
