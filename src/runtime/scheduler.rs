//! Airtime-governed send gate and in-flight packet bookkeeping.
//!
//! The `TxGate` is the single source of truth for "is it our turn to
//! transmit" and "which sequence numbers are still waiting on an ACK or
//! have finally failed": `TxNode` never touches timing directly, it only
//! asks the gate.

use std::collections::HashMap;

/// Bookkeeping for one unacknowledged sequence number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inflight {
    pub seq: u8,
    pub first_tx_ms: u64,
    pub last_tx_ms: u64,
    pub attempts: u32,
    pub toa_ms_est: f64,
}

/// Aggregate delivery metrics over the lifetime of a `TxGate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerMetrics {
    pub sent_count: u64,
    pub acked_count: u64,
    pub retries_total: u64,
    pub pdr: f64,
    pub etx: f64,
    pub total_toa_ms: f64,
}

/// Airtime-gated ARQ scheduler: bounds how many packets may be unacked at
/// once, enforces a guard interval between transmissions, and classifies
/// timeouts into "retry" vs "give up".
pub struct TxGate {
    max_inflight: usize,
    guard_ms: u64,
    max_retries: u32,
    inflight: HashMap<u8, Inflight>,
    last_tx_start_ms: Option<u64>,
    last_toa_ms: f64,
    sent_count: u64,
    acked_count: u64,
    retries_total: u64,
    total_toa_ms: f64,
}

impl TxGate {
    pub fn new(max_inflight: usize, guard_ms: u64, max_retries: u32) -> Self {
        Self {
            max_inflight,
            guard_ms,
            max_retries,
            inflight: HashMap::new(),
            last_tx_start_ms: None,
            last_toa_ms: 0.0,
            sent_count: 0,
            acked_count: 0,
            retries_total: 0,
            total_toa_ms: 0.0,
        }
    }

    /// True when there is inflight capacity and the guard interval after the
    /// last transmission's estimated airtime has elapsed.
    pub fn can_send(&self, now_ms: u64) -> bool {
        if self.inflight.len() >= self.max_inflight {
            return false;
        }
        match self.last_tx_start_ms {
            None => true,
            Some(last_start) => {
                let gate_until =
                    (last_start as f64 + self.last_toa_ms + self.guard_ms as f64) as u64;
                now_ms >= gate_until
            }
        }
    }

    /// Records a transmission attempt for `seq`, returning the attempt
    /// number (1 for a first send, incrementing on each retry).
    pub fn record_send(&mut self, now_ms: u64, seq: u8, toa_ms_est: f64) -> u32 {
        let attempt = match self.inflight.get_mut(&seq) {
            Some(entry) => {
                entry.attempts += 1;
                entry.last_tx_ms = now_ms;
                entry.toa_ms_est = toa_ms_est;
                self.retries_total += 1;
                entry.attempts
            }
            None => {
                self.inflight.insert(
                    seq,
                    Inflight {
                        seq,
                        first_tx_ms: now_ms,
                        last_tx_ms: now_ms,
                        attempts: 1,
                        toa_ms_est,
                    },
                );
                1
            }
        };
        self.sent_count += 1;
        self.total_toa_ms += toa_ms_est;
        self.last_tx_start_ms = Some(now_ms);
        self.last_toa_ms = toa_ms_est;
        attempt
    }

    /// Marks `ack_seq` acknowledged, removing it from the inflight set and
    /// returning its bookkeeping entry if it was actually inflight.
    pub fn mark_acked(&mut self, ack_seq: u8) -> Option<Inflight> {
        let entry = self.inflight.remove(&ack_seq);
        if entry.is_some() {
            self.acked_count += 1;
        }
        entry
    }

    /// Sequence numbers whose ACK timeout has elapsed but that still have
    /// retries remaining. `ack_timeout_ms` is resolved per sequence number
    /// (its own frame's estimated airtime may differ from another inflight
    /// sequence's) rather than passed as one shared value.
    pub fn expired_sequences<F>(&self, now_ms: u64, ack_timeout_ms: F) -> Vec<u8>
    where
        F: Fn(u8) -> u64,
    {
        self.inflight
            .values()
            .filter(|entry| {
                entry.attempts <= self.max_retries
                    && now_ms - entry.last_tx_ms >= ack_timeout_ms(entry.seq)
            })
            .map(|entry| entry.seq)
            .collect()
    }

    /// Pops and returns every inflight entry that has exhausted its retries
    /// and whose ACK timeout has elapsed: these are permanent failures.
    pub fn expired_failures<F>(&mut self, now_ms: u64, ack_timeout_ms: F) -> Vec<Inflight>
    where
        F: Fn(u8) -> u64,
    {
        let failed_seqs: Vec<u8> = self
            .inflight
            .values()
            .filter(|entry| {
                entry.attempts > self.max_retries
                    && now_ms - entry.last_tx_ms >= ack_timeout_ms(entry.seq)
            })
            .map(|entry| entry.seq)
            .collect();
        failed_seqs
            .into_iter()
            .filter_map(|seq| self.inflight.remove(&seq))
            .collect()
    }

    pub fn metrics(&self) -> SchedulerMetrics {
        let pdr = if self.sent_count > 0 {
            self.acked_count as f64 / self.sent_count as f64
        } else {
            0.0
        };
        let etx = self.sent_count as f64 / self.acked_count.max(1) as f64;
        SchedulerMetrics {
            sent_count: self.sent_count,
            acked_count: self.acked_count,
            retries_total: self.retries_total,
            pdr,
            etx,
            total_toa_ms: self.total_toa_ms,
        }
    }

    pub fn inflight(&self) -> HashMap<u8, Inflight> {
        self.inflight.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_send_when_inflight_is_full() {
        let mut gate = TxGate::new(1, 0, 3);
        assert!(gate.can_send(0));
        gate.record_send(0, 1, 50.0);
        assert!(!gate.can_send(0));
    }

    #[test]
    fn guard_interval_blocks_until_elapsed() {
        let mut gate = TxGate::new(2, 100, 3);
        gate.record_send(0, 1, 50.0);
        assert!(!gate.can_send(120));
        assert!(gate.can_send(150));
    }

    #[test]
    fn can_send_truncates_the_summed_float_deadline() {
        // 71.2ms toa + 0 guard should gate until 71ms (truncated), not 72ms
        // (ceiling of the toa term alone).
        let mut gate = TxGate::new(2, 0, 3);
        gate.record_send(0, 1, 71.2);
        assert!(!gate.can_send(70));
        assert!(gate.can_send(71));
    }

    #[test]
    fn record_send_increments_attempts_on_retry() {
        let mut gate = TxGate::new(2, 0, 3);
        assert_eq!(gate.record_send(0, 7, 10.0), 1);
        assert_eq!(gate.record_send(50, 7, 10.0), 2);
    }

    #[test]
    fn mark_acked_removes_from_inflight_and_is_idempotent_on_miss() {
        let mut gate = TxGate::new(2, 0, 3);
        gate.record_send(0, 5, 10.0);
        assert!(gate.mark_acked(5).is_some());
        assert!(gate.inflight().is_empty());
        assert!(gate.mark_acked(5).is_none());
    }

    #[test]
    fn expired_sequences_respects_retry_budget() {
        let mut gate = TxGate::new(2, 0, 1);
        gate.record_send(0, 9, 10.0);
        assert_eq!(gate.expired_sequences(100, |_| 50), vec![9]);
        gate.record_send(100, 9, 10.0); // attempt 2, still <= max_retries(1)? no: 2 > 1
        assert!(gate.expired_sequences(200, |_| 50).is_empty());
    }

    #[test]
    fn expired_failures_pops_only_exhausted_entries() {
        let mut gate = TxGate::new(2, 0, 1);
        gate.record_send(0, 3, 10.0);
        gate.record_send(50, 3, 10.0); // attempt 2 > max_retries(1)
        let failures = gate.expired_failures(100, |_| 50);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].seq, 3);
        assert!(gate.inflight().is_empty());
    }

    #[test]
    fn expired_sequences_resolves_timeout_per_sequence() {
        let mut gate = TxGate::new(2, 0, 3);
        gate.record_send(0, 1, 10.0); // short frame, short timeout
        gate.record_send(0, 2, 10.0); // long frame, long timeout
        let timeout_for = |seq: u8| if seq == 1 { 20 } else { 100 };
        // at t=25: seq 1's 20ms timeout has elapsed, seq 2's 100ms has not.
        assert_eq!(gate.expired_sequences(25, timeout_for), vec![1]);
    }

    #[test]
    fn metrics_computes_pdr_and_etx() {
        let mut gate = TxGate::new(2, 0, 3);
        gate.record_send(0, 1, 10.0);
        gate.record_send(0, 2, 10.0);
        gate.mark_acked(1);
        let metrics = gate.metrics();
        assert_eq!(metrics.sent_count, 2);
        assert_eq!(metrics.acked_count, 1);
        assert!((metrics.pdr - 0.5).abs() < 1e-9);
        assert!((metrics.etx - 2.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_with_zero_sends_is_well_defined() {
        let gate = TxGate::new(2, 0, 3);
        let metrics = gate.metrics();
        assert_eq!(metrics.pdr, 0.0);
        assert_eq!(metrics.etx, 0.0);
    }
}
