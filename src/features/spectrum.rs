//! FFT power spectrum plus the DCT and lifter tables used by MFCC.

use std::f64::consts::PI;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Power spectrum of a real frame: squared magnitudes of bins `0..=n/2`.
#[derive(Clone)]
pub struct PowerSpectrum {
    fft: Arc<dyn Fft<f32>>,
    len: usize,
}

impl Debug for PowerSpectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerSpectrum").field("len", &self.len).finish()
    }
}

impl PowerSpectrum {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(len),
            len,
        }
    }

    /// FFT length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bins returned by [`PowerSpectrum::compute`].
    pub fn num_bins(&self) -> usize {
        self.len / 2 + 1
    }

    pub fn compute(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = (0..self.len)
            .map(|i| Complex::new(frame.get(i).copied().unwrap_or(0.0), 0.0))
            .collect();
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.fft.process_with_scratch(&mut buffer, &mut scratch);
        buffer[..self.num_bins()]
            .iter()
            .map(|c| c.norm_sqr())
            .collect()
    }
}

/// Orthonormal DCT-II matrix of size `n x n`.
pub fn compute_dct_matrix(n: usize) -> Array2<f32> {
    let mut matrix = Array2::zeros((n, n));
    if n == 0 {
        return matrix;
    }
    let n_f = n as f64;
    let first = (1.0 / n_f).sqrt();
    matrix.row_mut(0).fill(first as f32);
    let normalizer = (2.0 / n_f).sqrt();
    for k in 1..n {
        for j in 0..n {
            let value = normalizer * (PI / n_f * (j as f64 + 0.5) * k as f64).cos();
            matrix[[k, j]] = value as f32;
        }
    }
    matrix
}

/// Cepstral lifter weights `1 + Q/2 * sin(pi * i / Q)`.
pub fn compute_lifter_coeffs(q: f32, dim: usize) -> Vec<f32> {
    let q = q as f64;
    (0..dim)
        .map(|i| (1.0 + 0.5 * q * (PI * i as f64 / q).sin()) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn impulse_has_flat_spectrum() {
        let spectrum = PowerSpectrum::new(16);
        let mut frame = vec![0.0_f32; 16];
        frame[0] = 2.0;
        let power = spectrum.compute(&frame);
        assert_eq!(power.len(), 9);
        assert!(power.iter().all(|&p| (p - 4.0).abs() < 1e-5));
    }

    #[test]
    fn sinusoid_peaks_at_its_bin() {
        let n = 64;
        let spectrum = PowerSpectrum::new(n);
        let frame: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / n as f32).cos())
            .collect();
        let power = spectrum.compute(&frame);
        let (peak, _) = power
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
        assert_eq!(peak, 8);
        assert_abs_diff_eq!(power[8], (n as f32 / 2.0).powi(2), epsilon = 1e-2);
    }

    #[test]
    fn dct_matrix_is_orthonormal() {
        let dct = compute_dct_matrix(8);
        let product = dct.dot(&dct.t());
        for i in 0..8 {
            for j in 0..8 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(product[[i, j]], expected, epsilon = 1e-5);
            }
        }
        assert_abs_diff_eq!(dct[[0, 3]], (1.0_f32 / 8.0).sqrt(), epsilon = 1e-7);
    }

    #[test]
    fn lifter_starts_at_one() {
        let coeffs = compute_lifter_coeffs(22.0, 13);
        assert_eq!(coeffs[0], 1.0);
        assert_abs_diff_eq!(coeffs[11], 12.0, epsilon = 1e-5);
    }
}
