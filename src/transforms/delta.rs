//! Regression-based delta (and delta-delta, ...) features.

use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_config, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaFeatureOptions {
    /// Highest derivative order; 2 appends deltas and delta-deltas.
    #[serde(alias = "delta_order")]
    pub order: usize,
    /// Half-width of the regression window.
    #[serde(alias = "delta_window")]
    pub window: usize,
}

impl Default for DeltaFeatureOptions {
    fn default() -> Self {
        Self {
            order: 2,
            window: 2,
        }
    }
}

impl DeltaFeatureOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.order < 1000,
            "delta order must be in [0, 999], got {}",
            self.order
        );
        ensure_config!(
            (1..1000).contains(&self.window),
            "delta window must be in [1, 999], got {}",
            self.window
        );
        Ok(())
    }
}

/// Precomputed regression filters, one per order.
#[derive(Debug, Clone)]
pub struct DeltaFeatures {
    opts: DeltaFeatureOptions,
    scales: Vec<Vec<f32>>,
}

impl DeltaFeatures {
    pub fn new(opts: DeltaFeatureOptions) -> Result<Self> {
        opts.validate()?;
        let window = opts.window as i64;
        let mut scales: Vec<Vec<f32>> = Vec::with_capacity(opts.order + 1);
        scales.push(vec![1.0]);
        for i in 1..=opts.order {
            let prev = &scales[i - 1];
            let prev_offset = ((prev.len() - 1) / 2) as i64;
            let cur_offset = prev_offset + window;
            let mut cur = vec![0.0_f32; prev.len() + 2 * opts.window];

            let mut normalizer = 0.0_f32;
            for j in -window..=window {
                normalizer += (j * j) as f32;
                for k in -prev_offset..=prev_offset {
                    cur[(j + k + cur_offset) as usize] += j as f32 * prev[(k + prev_offset) as usize];
                }
            }
            cur.iter_mut().for_each(|c| *c /= normalizer);
            scales.push(cur);
        }
        Ok(Self { opts, scales })
    }

    pub fn options(&self) -> &DeltaFeatureOptions {
        &self.opts
    }

    /// Regression filter for `order`, centered on the current frame.
    pub fn scales(&self, order: usize) -> &[f32] {
        &self.scales[order]
    }

    pub fn output_dim(&self, feat_dim: usize) -> usize {
        feat_dim * (self.opts.order + 1)
    }

    /// Output row for `frame`: the static features followed by each order of
    /// derivatives. Frames beyond the edges replicate the first/last row.
    pub fn process(&self, input: ArrayView2<'_, f32>, frame: usize) -> Array1<f32> {
        let (num_frames, feat_dim) = input.dim();
        let mut output = Array1::zeros(self.output_dim(feat_dim));
        if num_frames == 0 {
            return output;
        }
        let last = num_frames as i64 - 1;
        for (order, scales) in self.scales.iter().enumerate() {
            let max_offset = ((scales.len() - 1) / 2) as i64;
            let mut part = output.slice_mut(s![order * feat_dim..(order + 1) * feat_dim]);
            for j in -max_offset..=max_offset {
                let scale = scales[(j + max_offset) as usize];
                if scale == 0.0 {
                    continue;
                }
                let source = (frame as i64 + j).clamp(0, last) as usize;
                part.scaled_add(scale, &input.row(source));
            }
        }
        output
    }

    pub fn process_matrix(&self, input: ArrayView2<'_, f32>) -> Array2<f32> {
        let (num_frames, feat_dim) = input.dim();
        let mut output = Array2::zeros((num_frames, self.output_dim(feat_dim)));
        for (frame, mut row) in output.outer_iter_mut().enumerate() {
            row.assign(&self.process(input, frame));
        }
        output
    }
}

/// Append delta features to every row of `input`.
pub fn compute_deltas(opts: DeltaFeatureOptions, input: &Array2<f32>) -> Result<Array2<f32>> {
    Ok(DeltaFeatures::new(opts)?.process_matrix(input.view()))
}
