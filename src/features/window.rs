use std::f64::consts::PI;

use super::frame::{FrameExtractionOptions, WindowType};
use crate::error::Result;

/// Per-sample taper, computed once per frame configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindowFunction {
    window: Vec<f32>,
}

impl FeatureWindowFunction {
    pub fn new(opts: &FrameExtractionOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            window: build(opts.window_type, opts.window_size()),
        })
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.window
    }

    /// Multiply `frame` element-wise by the taper.
    pub fn apply(&self, frame: &mut [f32]) {
        for (sample, weight) in frame.iter_mut().zip(self.window.iter()) {
            *sample *= weight;
        }
    }
}

fn build(window_type: WindowType, size: usize) -> Vec<f32> {
    let a = 2.0 * PI / (size.max(2) - 1) as f64;
    (0..size)
        .map(|i| {
            let i = i as f64;
            let value = match window_type {
                WindowType::Hanning => 0.5 - 0.5 * (a * i).cos(),
                WindowType::Hamming => 0.54 - 0.46 * (a * i).cos(),
                WindowType::Povey => (0.5 - 0.5 * (a * i).cos()).powf(0.85),
                WindowType::Rectangular => 1.0,
                WindowType::Blackman { coeff } => {
                    let coeff = coeff as f64;
                    coeff - 0.5 * (a * i).cos() + (0.5 - coeff) * (2.0 * a * i).cos()
                }
            };
            value as f32
        })
        .collect()
}
