use std::f64::consts::PI;

use anyhow::{ensure, Result};

/// Zero crossings of the windowed-sinc kernel on each side of its center.
const LOWPASS_FILTER_WIDTH: f64 = 6.0;

/// Downsample `samples` from `source_rate` to `target_rate` with a
/// Hann-windowed sinc low-pass filter.
///
/// The cutoff sits just below the target Nyquist frequency. Upsampling is
/// rejected: features computed on interpolated audio would be misleading.
pub fn downsample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    ensure!(
        target_rate <= source_rate,
        "cannot upsample from {source_rate} Hz to {target_rate} Hz"
    );
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let source = source_rate as f64;
    let target = target_rate as f64;
    let cutoff = 0.99 * 0.5 * target;
    let half_width = LOWPASS_FILTER_WIDTH / (2.0 * cutoff);
    let output_len = (samples.len() as u64 * target_rate as u64 / source_rate as u64) as usize;

    let output = (0..output_len)
        .map(|i| {
            let t_out = i as f64 / target;
            let first = ((t_out - half_width) * source).ceil().max(0.0) as usize;
            let last = (((t_out + half_width) * source).floor() as usize).min(samples.len() - 1);
            (first..=last)
                .map(|j| samples[j] as f64 * kernel(t_out - j as f64 / source, cutoff) / source)
                .sum::<f64>() as f32
        })
        .collect();
    Ok(output)
}

fn kernel(t: f64, cutoff: f64) -> f64 {
    let half_width = LOWPASS_FILTER_WIDTH / (2.0 * cutoff);
    if t.abs() >= half_width {
        return 0.0;
    }
    let window = 0.5 * (1.0 + (2.0 * PI * cutoff / LOWPASS_FILTER_WIDTH * t).cos());
    let filter = if t == 0.0 {
        2.0 * cutoff
    } else {
        (2.0 * PI * cutoff * t).sin() / (PI * t)
    };
    window * filter
}
