//! Sliding-window cepstral mean (and variance) normalization.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_config, Result};

const VARIANCE_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidingWindowCmnOptions {
    /// Window length in frames.
    pub cmn_window: usize,
    /// Minimum window used at the start of the utterance (causal mode only).
    pub min_window: usize,
    /// Center the window on the current frame instead of trailing it.
    pub center: bool,
    pub normalize_variance: bool,
}

impl Default for SlidingWindowCmnOptions {
    fn default() -> Self {
        Self {
            cmn_window: 600,
            min_window: 100,
            center: false,
            normalize_variance: false,
        }
    }
}

impl SlidingWindowCmnOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.cmn_window > 0,
            "cmn_window must be positive, got {}",
            self.cmn_window
        );
        if self.center {
            ensure_config!(
                self.min_window > 0 && self.min_window <= self.cmn_window,
                "min_window must lie in (0, cmn_window = {}], got {}",
                self.cmn_window,
                self.min_window
            );
        }
        Ok(())
    }

    /// Half-open frame range `[start, end)` of the window used for frame `t`.
    pub fn window_bounds(&self, t: usize, num_frames: usize) -> (usize, usize) {
        let t = t as i64;
        let num_frames = num_frames as i64;
        let cmn_window = self.cmn_window as i64;
        let (mut start, mut end) = if self.center {
            let start = t - cmn_window / 2;
            (start, start + cmn_window)
        } else {
            (t - cmn_window, t + 1)
        };
        if start < 0 {
            end -= start;
            start = 0;
        }
        if !self.center && end > t {
            end = (t + 1).max(self.min_window as i64);
        }
        if end > num_frames {
            start -= end - num_frames;
            end = num_frames;
            if start < 0 {
                start = 0;
            }
        }
        (start as usize, end as usize)
    }
}

/// Normalize every row of `input` by the statistics of its sliding window.
///
/// Running sums are updated incrementally: between consecutive frames each
/// window edge moves by at most one frame.
pub fn sliding_window_cmn(
    opts: &SlidingWindowCmnOptions,
    input: &Array2<f32>,
) -> Result<Array2<f32>> {
    opts.validate()?;
    let (num_frames, dim) = input.dim();
    let mut output = Array2::zeros((num_frames, dim));
    if num_frames == 0 {
        return Ok(output);
    }

    let mut cur_sum = Array1::<f64>::zeros(dim);
    let mut cur_sumsq = Array1::<f64>::zeros(dim);
    let mut last_window: Option<(usize, usize)> = None;

    for t in 0..num_frames {
        let (window_start, window_end) = opts.window_bounds(t, num_frames);
        match last_window {
            None => {
                for row in input.slice(ndarray::s![window_start..window_end, ..]).outer_iter() {
                    accumulate(&mut cur_sum, &mut cur_sumsq, row, 1.0, opts.normalize_variance);
                }
            }
            Some((last_start, last_end)) => {
                if window_start > last_start {
                    debug_assert_eq!(window_start, last_start + 1);
                    accumulate(
                        &mut cur_sum,
                        &mut cur_sumsq,
                        input.row(last_start),
                        -1.0,
                        opts.normalize_variance,
                    );
                }
                if window_end > last_end {
                    debug_assert_eq!(window_end, last_end + 1);
                    accumulate(
                        &mut cur_sum,
                        &mut cur_sumsq,
                        input.row(last_end),
                        1.0,
                        opts.normalize_variance,
                    );
                }
            }
        }
        last_window = Some((window_start, window_end));

        let window_frames = (window_end - window_start) as f64;
        let mut out_row = output.row_mut(t);
        if opts.normalize_variance && window_end - window_start == 1 {
            out_row.fill(0.0);
            continue;
        }
        for d in 0..dim {
            let mean = cur_sum[d] / window_frames;
            let mut value = input[[t, d]] as f64 - mean;
            if opts.normalize_variance {
                let variance = (cur_sumsq[d] / window_frames - mean * mean).max(VARIANCE_FLOOR);
                value *= variance.powf(-0.5);
            }
            out_row[d] = value as f32;
        }
    }
    Ok(output)
}

fn accumulate(
    sum: &mut Array1<f64>,
    sumsq: &mut Array1<f64>,
    row: ndarray::ArrayView1<'_, f32>,
    sign: f64,
    with_squares: bool,
) {
    for (d, &value) in row.iter().enumerate() {
        let value = value as f64;
        sum[d] += sign * value;
        if with_squares {
            sumsq[d] += sign * value * value;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn opts(cmn_window: usize, min_window: usize, center: bool) -> SlidingWindowCmnOptions {
        SlidingWindowCmnOptions {
            cmn_window,
            min_window,
            center,
            normalize_variance: false,
        }
    }

    fn window_frames_match_direct_mean(opts: &SlidingWindowCmnOptions, input: &Array2<f32>) {
        let output = sliding_window_cmn(opts, input).unwrap();
        let num_frames = input.nrows();
        for t in 0..num_frames {
            let (start, end) = opts.window_bounds(t, num_frames);
            for d in 0..input.ncols() {
                let mean: f64 = (start..end).map(|r| input[[r, d]] as f64).sum::<f64>()
                    / (end - start) as f64;
                assert_abs_diff_eq!(output[[t, d]], (input[[t, d]] as f64 - mean) as f32, epsilon = 1e-4);
            }
        }
    }

    fn ramp(num_frames: usize, dim: usize) -> Array2<f32> {
        Array2::from_shape_fn((num_frames, dim), |(t, d)| ((t * 7 + d * 3) % 11) as f32 - 2.5)
    }

    #[test]
    fn causal_windows_extend_to_min_window() {
        let opts = opts(10, 4, false);
        assert_eq!(opts.window_bounds(0, 50), (0, 4));
        assert_eq!(opts.window_bounds(2, 50), (0, 4));
        assert_eq!(opts.window_bounds(5, 50), (0, 6));
        assert_eq!(opts.window_bounds(20, 50), (10, 21));
        assert_eq!(opts.window_bounds(0, 3), (0, 3));
    }

    #[test]
    fn centered_windows_are_clipped_with_constant_length() {
        let opts = opts(10, 1, true);
        assert_eq!(opts.window_bounds(0, 50), (0, 10));
        assert_eq!(opts.window_bounds(20, 50), (15, 25));
        assert_eq!(opts.window_bounds(49, 50), (40, 50));
        assert_eq!(opts.window_bounds(3, 6), (0, 6));
    }

    #[test]
    fn incremental_sums_match_direct_means() {
        let input = ramp(40, 3);
        window_frames_match_direct_mean(&opts(10, 4, false), &input);
        window_frames_match_direct_mean(&opts(9, 3, true), &input);
        window_frames_match_direct_mean(&opts(100, 100, false), &input);
    }

    #[test]
    fn window_edges_advance_by_at_most_one() {
        for opts in [opts(10, 4, false), opts(7, 2, true), opts(3, 5, false)] {
            let mut last = opts.window_bounds(0, 30);
            for t in 1..30 {
                let next = opts.window_bounds(t, 30);
                assert!(next.0 - last.0 <= 1 && next.1 - last.1 <= 1, "{opts:?} at {t}");
                last = next;
            }
        }
    }

    #[test]
    fn mean_subtraction_is_idempotent_on_its_fixed_point() {
        let opts = opts(600, 100, true);
        let once = sliding_window_cmn(&opts, &ramp(25, 4)).unwrap();
        let twice = sliding_window_cmn(&opts, &once).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn variance_normalization_gives_unit_variance() {
        let opts = SlidingWindowCmnOptions {
            normalize_variance: true,
            ..opts(600, 100, true)
        };
        let output = sliding_window_cmn(&opts, &ramp(30, 2)).unwrap();
        for column in output.columns() {
            let mean = column.iter().map(|&v| v as f64).sum::<f64>() / 30.0;
            let var = column.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / 30.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn single_frame_window_with_variance_is_zero() {
        let opts = SlidingWindowCmnOptions {
            normalize_variance: true,
            ..opts(5, 1, false)
        };
        let input = Array2::from_elem((1, 3), 9.0_f32);
        let output = sliding_window_cmn(&opts, &input).unwrap();
        assert!(output.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rejects_invalid_windows() {
        assert!(opts(0, 0, false).validate().is_err());
        assert!(opts(10, 0, true).validate().is_err());
        assert!(opts(10, 11, true).validate().is_err());
        assert!(opts(10, 11, false).validate().is_ok());
    }
}
