//! Triangular mel filterbank over FFT bins, with optional VTLN frequency warping.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::frame::FrameExtractionOptions;
use crate::error::{ensure_config, FeatureError, Result};

pub fn mel_scale(freq: f32) -> f32 {
    1127.0 * (1.0 + freq / 700.0).ln()
}

pub fn inverse_mel_scale(mel: f32) -> f32 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelBanksOptions {
    #[serde(alias = "num_mel_bins")]
    pub num_bins: usize,
    pub low_freq: f32,
    /// Upper cutoff in Hz; zero or negative values are relative to nyquist.
    pub high_freq: f32,
    /// Lower VTLN inflection point in Hz.
    pub vtln_low: f32,
    /// Upper VTLN inflection point; negative values are relative to nyquist.
    pub vtln_high: f32,
}

impl Default for MelBanksOptions {
    fn default() -> Self {
        Self {
            num_bins: 25,
            low_freq: 20.0,
            high_freq: 0.0,
            vtln_low: 100.0,
            vtln_high: -500.0,
        }
    }
}

impl MelBanksOptions {
    pub fn with_bins(num_bins: usize) -> Self {
        Self {
            num_bins,
            ..Self::default()
        }
    }
}

/// Piecewise-linear VTLN warp of a frequency in Hz.
///
/// Frequencies outside `[low_freq, high_freq]` are left alone; the band
/// between the two inflection points is scaled by `1 / warp_factor` and the
/// outer segments are stretched so the end points stay fixed.
pub fn vtln_warp_freq(
    vtln_low_cutoff: f32,
    vtln_high_cutoff: f32,
    low_freq: f32,
    high_freq: f32,
    warp_factor: f32,
    freq: f32,
) -> f32 {
    if freq < low_freq || freq > high_freq {
        return freq;
    }
    let l = vtln_low_cutoff * warp_factor.max(1.0);
    let h = vtln_high_cutoff * warp_factor.min(1.0);
    let scale = 1.0 / warp_factor;
    let fl = scale * l;
    let fh = scale * h;

    let scale_left = (fl - low_freq) / (l - low_freq);
    let scale_right = (high_freq - fh) / (high_freq - h);

    if freq < l {
        low_freq + scale_left * (freq - low_freq)
    } else if freq < h {
        scale * freq
    } else {
        high_freq + scale_right * (freq - high_freq)
    }
}

pub fn vtln_warp_mel_freq(
    vtln_low_cutoff: f32,
    vtln_high_cutoff: f32,
    low_freq: f32,
    high_freq: f32,
    warp_factor: f32,
    mel_freq: f32,
) -> f32 {
    mel_scale(vtln_warp_freq(
        vtln_low_cutoff,
        vtln_high_cutoff,
        low_freq,
        high_freq,
        warp_factor,
        inverse_mel_scale(mel_freq),
    ))
}

/// Weight of a point at `mel` inside the triangle `(left, center, right)`.
pub fn triangle_weight(mel: f32, left: f32, center: f32, right: f32) -> f32 {
    if mel <= left || mel >= right {
        0.0
    } else if mel <= center {
        (mel - left) / (center - left)
    } else {
        (right - mel) / (right - center)
    }
}

/// Contiguous non-zero weights of one mel bin.
#[derive(Debug, Clone, PartialEq)]
pub struct MelBin {
    pub first_index: usize,
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MelFilterBank {
    bins: Vec<MelBin>,
    center_freqs: Vec<f32>,
}

impl MelFilterBank {
    pub fn new(
        opts: &MelBanksOptions,
        frame_opts: &FrameExtractionOptions,
        vtln_warp_factor: f32,
    ) -> Result<Self> {
        let num_bins = opts.num_bins;
        ensure_config!(num_bins >= 3, "must have at least 3 mel bins, got {num_bins}");
        frame_opts.validate()?;

        let sample_freq = frame_opts.samp_freq;
        let window_length_padded = frame_opts.padded_window_size();
        ensure_config!(
            window_length_padded % 2 == 0,
            "padded window size {window_length_padded} must be even"
        );
        let num_fft_bins = window_length_padded / 2;
        let nyquist = 0.5 * sample_freq;

        let low_freq = opts.low_freq;
        let high_freq = if opts.high_freq > 0.0 {
            opts.high_freq
        } else {
            nyquist + opts.high_freq
        };
        ensure_config!(
            low_freq >= 0.0
                && low_freq < nyquist
                && high_freq > 0.0
                && high_freq <= nyquist
                && high_freq > low_freq,
            "bad values in options: low-freq {low_freq} and high-freq {high_freq} vs. nyquist {nyquist}"
        );

        let fft_bin_width = sample_freq / window_length_padded as f32;
        let mel_low_freq = mel_scale(low_freq);
        let mel_high_freq = mel_scale(high_freq);
        let mel_freq_delta = (mel_high_freq - mel_low_freq) / (num_bins + 1) as f32;

        let vtln_low = opts.vtln_low;
        let vtln_high = if opts.vtln_high < 0.0 {
            opts.vtln_high + nyquist
        } else {
            opts.vtln_high
        };
        let warped = vtln_warp_factor != 1.0;
        if warped {
            ensure_config!(
                vtln_warp_factor > 0.0,
                "VTLN warp factor must be positive, got {vtln_warp_factor}"
            );
            ensure_config!(
                vtln_low > low_freq
                    && vtln_low < high_freq
                    && vtln_high > 0.0
                    && vtln_high < high_freq
                    && vtln_high > vtln_low,
                "bad values in options: vtln-low {vtln_low} and vtln-high {vtln_high}, versus low-freq {low_freq} and high-freq {high_freq}"
            );
            let l = vtln_low * vtln_warp_factor.max(1.0);
            let h = vtln_high * vtln_warp_factor.min(1.0);
            ensure_config!(
                l > low_freq && h < high_freq,
                "VTLN warp factor {vtln_warp_factor} moves the inflection points outside ({low_freq}, {high_freq})"
            );
        }
        let warp = |mel: f32| {
            if warped {
                vtln_warp_mel_freq(vtln_low, vtln_high, low_freq, high_freq, vtln_warp_factor, mel)
            } else {
                mel
            }
        };

        let mut bins = Vec::with_capacity(num_bins);
        let mut center_freqs = Vec::with_capacity(num_bins);
        for bin in 0..num_bins {
            let left_mel = warp(mel_low_freq + bin as f32 * mel_freq_delta);
            let center_mel = warp(mel_low_freq + (bin + 1) as f32 * mel_freq_delta);
            let right_mel = warp(mel_low_freq + (bin + 2) as f32 * mel_freq_delta);
            center_freqs.push(inverse_mel_scale(center_mel));

            let mut first_index = None;
            let mut weights = Vec::new();
            for i in 0..=num_fft_bins {
                let mel = mel_scale(fft_bin_width * i as f32);
                let weight = triangle_weight(mel, left_mel, center_mel, right_mel);
                if weight > 0.0 {
                    let first = *first_index.get_or_insert(i);
                    weights.resize(i - first, 0.0);
                    weights.push(weight);
                }
            }
            let first_index = first_index.ok_or_else(|| {
                FeatureError::config(format!(
                    "mel bin {bin} covers no FFT bins; you may have set num_mel_bins ({num_bins}) too large"
                ))
            })?;
            bins.push(MelBin {
                first_index,
                weights,
            });
        }

        debug!(
            num_bins,
            low_freq,
            high_freq,
            vtln_warp_factor,
            padded_window = window_length_padded,
            "built mel filterbank"
        );
        Ok(Self { bins, center_freqs })
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn bins(&self) -> &[MelBin] {
        &self.bins
    }

    /// Center frequency in Hz of every bin.
    pub fn center_freqs(&self) -> &[f32] {
        &self.center_freqs
    }

    pub fn compute(&self, power_spectrum: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; self.bins.len()];
        self.compute_into(power_spectrum, &mut out);
        out
    }

    /// Write one mel energy per bin into `out`.
    pub fn compute_into(&self, power_spectrum: &[f32], out: &mut [f32]) {
        for (slot, bin) in out.iter_mut().zip(self.bins.iter()) {
            let spectrum = &power_spectrum[bin.first_index..bin.first_index + bin.weights.len()];
            *slot = bin
                .weights
                .iter()
                .zip(spectrum.iter())
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

/// Everything that determines the contents of a [`MelFilterBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MelBankKey {
    num_bins: usize,
    low_freq: u32,
    high_freq: u32,
    vtln_low: u32,
    vtln_high: u32,
    samp_freq: u32,
    padded_window: usize,
    warp_factor: u32,
}

impl MelBankKey {
    fn new(opts: &MelBanksOptions, frame_opts: &FrameExtractionOptions, warp_factor: f32) -> Self {
        Self {
            num_bins: opts.num_bins,
            low_freq: opts.low_freq.to_bits(),
            high_freq: opts.high_freq.to_bits(),
            vtln_low: opts.vtln_low.to_bits(),
            vtln_high: opts.vtln_high.to_bits(),
            samp_freq: frame_opts.samp_freq.to_bits(),
            padded_window: frame_opts.padded_window_size(),
            warp_factor: warp_factor.to_bits(),
        }
    }
}

/// Memoizes filterbanks per (mel options, frame options, warp factor).
/// Entries are built on first use and never invalidated.
#[derive(Debug, Default)]
pub struct MelBankCache {
    banks: RwLock<HashMap<MelBankKey, Arc<MelFilterBank>>>,
}

impl MelBankCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        opts: &MelBanksOptions,
        frame_opts: &FrameExtractionOptions,
        warp_factor: f32,
    ) -> Result<Arc<MelFilterBank>> {
        let key = MelBankKey::new(opts, frame_opts, warp_factor);
        {
            let banks = self.banks.read().unwrap_or_else(|err| err.into_inner());
            if let Some(bank) = banks.get(&key) {
                return Ok(Arc::clone(bank));
            }
        }
        let bank = Arc::new(MelFilterBank::new(opts, frame_opts, warp_factor)?);
        let mut banks = self.banks.write().unwrap_or_else(|err| err.into_inner());
        Ok(Arc::clone(banks.entry(key).or_insert(bank)))
    }

    pub fn len(&self) -> usize {
        self.banks
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
