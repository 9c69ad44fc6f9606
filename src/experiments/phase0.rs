//! Phase 0: sweep PHY profiles to find the one whose packet-delivery ratio
//! lands inside a target band at a fixed payload size ("C50" search).

use crate::config::runspec::PhySpec;
use crate::error::ConfigError;
use crate::experiments::metrics::RunMetrics;

/// One swept profile's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct C50Result {
    pub phy: PhySpec,
    pub metrics: RunMetrics,
    pub in_band: bool,
}

/// Sweep outcome: the first profile whose PDR landed in
/// `[target_low, target_high]`, plus every profile's result for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct C50SweepOutcome {
    pub selected: Option<PhySpec>,
    pub results: Vec<C50Result>,
}

/// Runs `run_profile` once per candidate PHY and returns the first whose
/// resulting PDR lands in the target band. `run_profile` is expected to run
/// a bounded TX/RX pair under that PHY and return the TX-side metrics.
/// Callers own session/radio/codec construction (see `tests` below for the
/// shape), since that wiring needs a fresh mock link and loggers per run.
pub fn find_c50<F>(
    sweep: &[PhySpec],
    target_low: f64,
    target_high: f64,
    mut run_profile: F,
) -> Result<C50SweepOutcome, ConfigError>
where
    F: FnMut(&PhySpec) -> Result<RunMetrics, ConfigError>,
{
    let mut results = Vec::with_capacity(sweep.len());
    let mut selected = None;
    for phy in sweep {
        let metrics = run_profile(phy)?;
        let in_band = metrics.pdr >= target_low && metrics.pdr <= target_high;
        if in_band && selected.is_none() {
            selected = Some(*phy);
        }
        results.push(C50Result {
            phy: *phy,
            metrics,
            in_band,
        });
    }
    Ok(C50SweepOutcome { selected, results })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phy(sf: u32) -> PhySpec {
        PhySpec {
            sf,
            bw_hz: 125_000,
            cr: 5,
            preamble: 8,
            crc_on: true,
            explicit_header: true,
            tx_power_dbm: 14,
            ldro: None,
        }
    }

    fn metrics_with_pdr(pdr: f64) -> RunMetrics {
        let mut metrics = RunMetrics::default();
        metrics.pdr = pdr;
        metrics
    }

    #[test]
    fn selects_first_profile_in_band() {
        let sweep = vec![phy(7), phy(8), phy(9)];
        let pdrs = [0.1, 0.55, 0.9];
        let mut idx = 0;
        let outcome = find_c50(&sweep, 0.4, 0.6, |_phy| {
            let pdr = pdrs[idx];
            idx += 1;
            Ok(metrics_with_pdr(pdr))
        })
        .unwrap();
        assert_eq!(outcome.selected, Some(phy(8)));
        assert_eq!(outcome.results.len(), 3);
        assert!(!outcome.results[0].in_band);
        assert!(outcome.results[1].in_band);
    }

    #[test]
    fn returns_none_selected_when_nothing_in_band() {
        let sweep = vec![phy(7), phy(8)];
        let outcome = find_c50(&sweep, 0.4, 0.6, |_phy| Ok(metrics_with_pdr(0.99))).unwrap();
        assert!(outcome.selected.is_none());
    }
}
