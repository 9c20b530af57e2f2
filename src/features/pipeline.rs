use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::computer::{FeatureComputer, SpectralFeature};
use super::frame::{extract_window, frame_count};
use super::window::FeatureWindowFunction;
use super::FeatureMatrix;
use crate::error::{ensure_config, FeatureError, Result};

/// Drives frame segmentation and a feature computer across a whole waveform.
#[derive(Debug)]
pub struct FeaturePipeline<C = FeatureComputer> {
    computer: C,
    window_function: FeatureWindowFunction,
}

impl<C: SpectralFeature + Sync> FeaturePipeline<C> {
    pub fn new(computer: C) -> Result<Self> {
        let window_function = FeatureWindowFunction::new(computer.frame_options())?;
        Ok(Self {
            computer,
            window_function,
        })
    }

    pub fn computer(&self) -> &C {
        &self.computer
    }

    pub fn dimension(&self) -> usize {
        self.computer.dimension()
    }

    /// Compute one feature row per frame of `waveform`.
    ///
    /// `sample_rate` must match the configured `samp_freq`; no resampling
    /// happens here.
    pub fn compute(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureMatrix> {
        self.compute_features(waveform, sample_rate, 1.0)
    }

    pub fn compute_features(
        &self,
        waveform: &[f32],
        sample_rate: u32,
        vtln_warp: f32,
    ) -> Result<FeatureMatrix> {
        let samp_freq = self.computer.frame_options().samp_freq;
        ensure_config!(
            sample_rate as f32 == samp_freq,
            "waveform sample rate {sample_rate} Hz does not match configured {samp_freq} Hz"
        );
        self.compute_frames(waveform, vtln_warp)
    }

    /// Rows are computed in parallel; row order always follows frame order.
    pub fn compute_frames(&self, waveform: &[f32], vtln_warp: f32) -> Result<FeatureMatrix> {
        let opts = self.computer.frame_options();
        let rows = frame_count(waveform.len(), opts);
        let cols = self.computer.dimension();
        if rows == 0 {
            warn!(
                samples = waveform.len(),
                frame_length = opts.window_size(),
                "waveform too short for a single frame; no features produced"
            );
            return Ok(Array2::zeros((0, cols)));
        }

        let use_raw_log_energy = self.computer.needs_raw_log_energy();
        let computed: Vec<Vec<f32>> = (0..rows)
            .into_par_iter()
            .map(|frame| {
                let (window, raw_log_energy) = extract_window(
                    0,
                    waveform,
                    frame,
                    opts,
                    &self.window_function,
                    use_raw_log_energy,
                )?;
                self.computer
                    .compute_warped(raw_log_energy.unwrap_or(0.0), vtln_warp, &window)
            })
            .collect::<Result<_>>()?;

        let mut flat = Vec::with_capacity(rows * cols);
        for row in computed {
            flat.extend(row);
        }
        debug!(
            rows,
            cols,
            window = %opts.window_type,
            "computed feature matrix"
        );
        Array2::from_shape_vec((rows, cols), flat)
            .map_err(|err| FeatureError::data(format!("invalid feature matrix shape: {err}")))
    }
}
