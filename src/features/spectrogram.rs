use serde::{Deserialize, Serialize};

use super::computer::{floor_log_energy, SpectralFeature};
use super::frame::{log_energy, FrameExtractionOptions};
use super::spectrum::PowerSpectrum;
use super::EPSILON;
use crate::error::{ensure_config, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramOptions {
    pub frame_opts: FrameExtractionOptions,
    pub energy_floor: f32,
    pub raw_energy: bool,
}

impl Default for SpectrogramOptions {
    fn default() -> Self {
        Self {
            frame_opts: FrameExtractionOptions::default(),
            energy_floor: 0.0,
            raw_energy: true,
        }
    }
}

/// Log power spectrum; element 0 carries the frame log energy.
#[derive(Debug)]
pub struct SpectrogramComputer {
    opts: SpectrogramOptions,
    log_energy_floor: Option<f32>,
    spectrum: PowerSpectrum,
}

impl SpectrogramComputer {
    pub fn new(opts: SpectrogramOptions) -> Result<Self> {
        opts.frame_opts.validate()?;
        let log_energy_floor = (opts.energy_floor > 0.0).then(|| opts.energy_floor.ln());
        let spectrum = PowerSpectrum::new(opts.frame_opts.padded_window_size());
        Ok(Self {
            opts,
            log_energy_floor,
            spectrum,
        })
    }

    pub fn options(&self) -> &SpectrogramOptions {
        &self.opts
    }
}

impl SpectralFeature for SpectrogramComputer {
    fn dimension(&self) -> usize {
        self.opts.frame_opts.padded_window_size() / 2 + 1
    }

    fn needs_raw_log_energy(&self) -> bool {
        self.opts.raw_energy
    }

    fn frame_options(&self) -> &FrameExtractionOptions {
        &self.opts.frame_opts
    }

    /// The spectrogram has no mel stage, so `vtln_warp` is ignored.
    fn compute_warped(&self, raw_log_energy: f32, _vtln_warp: f32, frame: &[f32]) -> Result<Vec<f32>> {
        let padded = self.opts.frame_opts.padded_window_size();
        ensure_config!(
            frame.len() == padded,
            "frame has {} samples, expected {}",
            frame.len(),
            padded
        );

        let signal_log_energy = if self.opts.raw_energy {
            raw_log_energy
        } else {
            log_energy(frame)
        };

        let mut feature: Vec<f32> = self
            .spectrum
            .compute(frame)
            .into_iter()
            .map(|p| p.max(EPSILON).ln())
            .collect();
        feature[0] = floor_log_energy(signal_log_energy, self.log_energy_floor);
        Ok(feature)
    }
}
