//! In-process link between two mock radios: per-direction loss model and a
//! latency-ordered delivery queue, so TX/RX exchanges can be tested without
//! real hardware.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::RadioError;
use crate::radio::Radio;
use crate::runtime::Clock;

/// Decides whether a given send should be dropped.
enum LossModel {
    Bernoulli { loss_rate: f64, rng: StdRng },
    Pattern { pattern: Vec<bool>, index: usize },
}

impl LossModel {
    fn bernoulli(loss_rate: f64, seed: u64) -> Self {
        LossModel::Bernoulli {
            loss_rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pattern(pattern: Vec<bool>) -> Self {
        LossModel::Pattern { pattern, index: 0 }
    }

    fn should_drop(&mut self) -> bool {
        match self {
            LossModel::Bernoulli { loss_rate, rng } => rng.gen::<f64>() < *loss_rate,
            LossModel::Pattern { pattern, index } => {
                if pattern.is_empty() {
                    return false;
                }
                let drop = pattern[*index % pattern.len()];
                *index += 1;
                drop
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Delivery {
    deliver_at_ms: u64,
    frame: Vec<u8>,
}

impl PartialEq for Delivery {
    fn eq(&self, other: &Self) -> bool {
        self.deliver_at_ms == other.deliver_at_ms
    }
}
impl Eq for Delivery {}
impl PartialOrd for Delivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Delivery {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest delivery.
        other.deliver_at_ms.cmp(&self.deliver_at_ms)
    }
}

struct LinkState {
    loss_ab: LossModel,
    loss_ba: LossModel,
    latency_ms: u64,
    queue_to_a: BinaryHeap<Delivery>,
    queue_to_b: BinaryHeap<Delivery>,
    clock: Arc<Mutex<dyn Clock>>,
}

/// Shared link between two `MockRadio` endpoints, named A and B.
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

/// Parameters for `MockLink::new`. Mirrors
/// Construction parameters for the two-directional loss/latency model.
pub struct MockLinkConfig {
    pub loss_rate: f64,
    pub latency_ms: u64,
    pub seed: u64,
    pub drop_pattern: Option<Vec<bool>>,
    pub loss_rate_ab: Option<f64>,
    pub loss_rate_ba: Option<f64>,
    pub drop_pattern_ab: Option<Vec<bool>>,
    pub drop_pattern_ba: Option<Vec<bool>>,
}

impl Default for MockLinkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            latency_ms: 0,
            seed: 0,
            drop_pattern: None,
            loss_rate_ab: None,
            loss_rate_ba: None,
            drop_pattern_ab: None,
            drop_pattern_ba: None,
        }
    }
}

impl MockLink {
    /// `clock` drives delivery timing; B's loss model seed is `seed + 1` by
    /// default unless overridden via per-direction params.
    pub fn new(config: MockLinkConfig, clock: Arc<Mutex<dyn Clock>>) -> (MockRadio, MockRadio) {
        let loss_ab = match &config.drop_pattern_ab {
            Some(pattern) => LossModel::pattern(pattern.clone()),
            None => match &config.drop_pattern {
                Some(pattern) => LossModel::pattern(pattern.clone()),
                None => LossModel::bernoulli(
                    config.loss_rate_ab.unwrap_or(config.loss_rate),
                    config.seed,
                ),
            },
        };
        let loss_ba = match &config.drop_pattern_ba {
            Some(pattern) => LossModel::pattern(pattern.clone()),
            None => match &config.drop_pattern {
                Some(pattern) => LossModel::pattern(pattern.clone()),
                None => LossModel::bernoulli(
                    config.loss_rate_ba.unwrap_or(config.loss_rate),
                    config.seed + 1,
                ),
            },
        };

        let state = Arc::new(Mutex::new(LinkState {
            loss_ab,
            loss_ba,
            latency_ms: config.latency_ms,
            queue_to_a: BinaryHeap::new(),
            queue_to_b: BinaryHeap::new(),
            clock,
        }));

        let link = MockLink { state };
        let radio_a = MockRadio {
            link: link.state.clone(),
            endpoint: Endpoint::A,
        };
        let radio_b = MockRadio {
            link: link.state.clone(),
            endpoint: Endpoint::B,
        };
        (radio_a, radio_b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    A,
    B,
}

/// One side of a `MockLink`. Implements `Radio` and `RxRssi`.
pub struct MockRadio {
    link: Arc<Mutex<LinkState>>,
    endpoint: Endpoint,
}

impl MockRadio {
    fn send_internal(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        let mut state = self.link.state_lock()?;
        let now = state.clock.lock().map_err(|_| RadioError::Closed)?.now_ms();
        let delivered = match self.endpoint {
            Endpoint::A => !state.loss_ab.should_drop(),
            Endpoint::B => !state.loss_ba.should_drop(),
        };
        if delivered {
            let delivery = Delivery {
                deliver_at_ms: now + state.latency_ms,
                frame: frame.to_vec(),
            };
            match self.endpoint {
                Endpoint::A => state.queue_to_b.push(delivery),
                Endpoint::B => state.queue_to_a.push(delivery),
            }
        }
        Ok(())
    }

    fn recv_internal(&mut self) -> Result<Option<Vec<u8>>, RadioError> {
        let mut state = self.link.state_lock()?;
        let now = state.clock.lock().map_err(|_| RadioError::Closed)?.now_ms();
        let queue = match self.endpoint {
            Endpoint::A => &mut state.queue_to_a,
            Endpoint::B => &mut state.queue_to_b,
        };
        let ready = matches!(queue.peek(), Some(d) if d.deliver_at_ms <= now);
        if !ready {
            return Ok(None);
        }
        let delivery = queue.pop().unwrap();
        Ok(Some(delivery.frame))
    }
}

/// Small helper trait so `Arc<Mutex<LinkState>>` reads like a field access
/// above without repeating the lock-and-map-error boilerplate everywhere.
trait LockExt {
    fn state_lock(&self) -> Result<std::sync::MutexGuard<'_, LinkState>, RadioError>;
}

impl LockExt for Arc<Mutex<LinkState>> {
    fn state_lock(&self) -> Result<std::sync::MutexGuard<'_, LinkState>, RadioError> {
        self.lock().map_err(|_| RadioError::Closed)
    }
}

impl Radio for MockRadio {
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.send_internal(frame)
    }

    fn recv(&mut self, _timeout_ms: u64) -> Result<Option<Vec<u8>>, RadioError> {
        self.recv_internal()
    }

    fn close(&mut self) {}
}

// `MockRadio` does not simulate RSSI: `RxRssi` is a capability real radio
// drivers add, not something a loss/latency simulator can supply honestly.
