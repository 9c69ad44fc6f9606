//! Phase 1: compare a RAW baseline run against a LATENT run under the same
//! PHY and window shape, reporting the delta in PDR/ETX/airtime.

use crate::config::runspec::{Mode, RunSpec};
use crate::error::ConfigError;
use crate::experiments::metrics::RunMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AbDelta {
    pub pdr: f64,
    pub etx: f64,
    pub total_toa_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbResult {
    pub raw: RunMetrics,
    pub latent: RunMetrics,
    pub delta: AbDelta,
}

/// Validates that `raw_runspec`/`latent_runspec` are comparable (same PHY
/// and window shape, correct declared modes) then runs each via
/// `run_profile` and reports the RAW-minus-LATENT delta.
pub fn run_ab<F>(
    raw_runspec: &RunSpec,
    latent_runspec: &RunSpec,
    mut run_profile: F,
) -> Result<AbResult, ConfigError>
where
    F: FnMut(&RunSpec) -> Result<RunMetrics, ConfigError>,
{
    if raw_runspec.mode != Mode::Raw {
        return Err(ConfigError::Invalid("raw_runspec.mode must be RAW".into()));
    }
    if latent_runspec.mode != Mode::Latent {
        return Err(ConfigError::Invalid(
            "latent_runspec.mode must be LATENT".into(),
        ));
    }
    if raw_runspec.phy != latent_runspec.phy {
        return Err(ConfigError::Invalid(
            "raw and latent runs must share the same PHY profile".into(),
        ));
    }
    if raw_runspec.window != latent_runspec.window {
        return Err(ConfigError::Invalid(
            "raw and latent runs must share the same window shape".into(),
        ));
    }

    let raw = run_profile(raw_runspec)?;
    let latent = run_profile(latent_runspec)?;
    let delta = AbDelta {
        pdr: raw.pdr - latent.pdr,
        etx: raw.etx - latent.etx,
        total_toa_ms: raw.total_toa_ms - latent.total_toa_ms,
    };
    Ok(AbResult { raw, latent, delta })
}
