//! Energy-based voice activity detection over column 0 of a feature matrix.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ensure_config, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadEnergyOptions {
    /// Constant term of the log-energy threshold.
    #[serde(alias = "energy_threshold")]
    pub vad_energy_threshold: f32,
    /// Weight of the utterance's mean log energy added to the threshold.
    #[serde(alias = "energy_mean_scale")]
    pub vad_energy_mean_scale: f32,
    /// Frames of context on each side of the decision frame.
    #[serde(alias = "frames_context")]
    pub vad_frames_context: usize,
    /// Fraction of context frames that must exceed the threshold.
    #[serde(alias = "proportion_threshold")]
    pub vad_proportion_threshold: f32,
}

impl Default for VadEnergyOptions {
    fn default() -> Self {
        Self {
            vad_energy_threshold: 5.0,
            vad_energy_mean_scale: 0.5,
            vad_frames_context: 0,
            vad_proportion_threshold: 0.6,
        }
    }
}

impl VadEnergyOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.vad_energy_mean_scale >= 0.0,
            "vad energy mean scale must be non-negative, got {}",
            self.vad_energy_mean_scale
        );
        ensure_config!(
            self.vad_proportion_threshold > 0.0 && self.vad_proportion_threshold < 1.0,
            "vad proportion threshold must lie in (0, 1), got {}",
            self.vad_proportion_threshold
        );
        Ok(())
    }
}

/// One decision per frame: 1.0 for voiced, 0.0 for unvoiced.
///
/// An empty matrix yields an empty vector; that is logged but not an error.
pub fn compute_vad_energy(opts: &VadEnergyOptions, features: &Array2<f32>) -> Result<Vec<f32>> {
    opts.validate()?;
    let num_frames = features.nrows();
    if num_frames == 0 || features.ncols() == 0 {
        warn!("empty feature matrix; no voice activity decisions produced");
        return Ok(Vec::new());
    }

    let log_energy = features.column(0);
    let mut threshold = opts.vad_energy_threshold;
    if opts.vad_energy_mean_scale != 0.0 {
        let mean = log_energy.iter().map(|&e| e as f64).sum::<f64>() / num_frames as f64;
        threshold += opts.vad_energy_mean_scale * mean as f32;
    }

    let context = opts.vad_frames_context;
    let decisions = (0..num_frames)
        .map(|t| {
            let start = t.saturating_sub(context);
            let end = (t + context + 1).min(num_frames);
            let den = end - start;
            let num = (start..end)
                .filter(|&t2| log_energy[t2] > threshold)
                .count();
            if num as f32 >= den as f32 * opts.vad_proportion_threshold {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Ok(decisions)
}
