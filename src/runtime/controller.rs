//! Drives a TX/RX pair to completion by single-stepping both sides and
//! advancing a shared clock between steps.

use std::sync::{Arc, Mutex};

use crate::config::artifacts::ArtifactsManifest;
use crate::config::runspec::RunSpec;
use crate::error::ConfigError;
use crate::runtime::rx_node::RxNode;
use crate::runtime::tx_node::TxNode;
use crate::runtime::Clock;

/// Logs the mandatory `run_start` event on both sides, then steps `tx` and
/// `rx` in lockstep until `tx.is_done()`, or `max_steps` is reached (a
/// safety backstop against runaway loops in a misconfigured experiment).
#[allow(clippy::too_many_arguments)]
pub fn run_pair(
    tx: &mut TxNode,
    rx: &mut RxNode,
    clock: &Arc<Mutex<dyn Clock>>,
    tx_runspec: &RunSpec,
    rx_runspec: &RunSpec,
    manifest: Option<&ArtifactsManifest>,
    step_ms: u64,
    max_steps: u64,
) -> Result<u64, ConfigError> {
    tx.log_run_start(tx_runspec, manifest)?;
    rx.log_run_start(rx_runspec, manifest)?;
    let mut steps = 0u64;
    loop {
        tx.process_once()?;
        rx.process_once()?;
        if tx.is_done() {
            break;
        }
        steps += 1;
        if steps >= max_steps {
            break;
        }
        clock.lock().expect("clock mutex poisoned").sleep_ms(step_ms);
    }
    Ok(steps)
}
