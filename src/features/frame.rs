//! Frame segmentation: how a waveform is sliced into overlapping analysis
//! frames and how each frame is conditioned before the transform stage.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::window::FeatureWindowFunction;
use super::FLOAT_MIN;
use crate::error::{ensure_config, FeatureError, Result};

const DEFAULT_BLACKMAN_COEFF: f32 = 0.42;

/// Taper applied to every analysis frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Rectangular,
    Hanning,
    Hamming,
    Povey,
    Blackman {
        #[serde(default = "default_blackman_coeff")]
        coeff: f32,
    },
}

fn default_blackman_coeff() -> f32 {
    DEFAULT_BLACKMAN_COEFF
}

impl FromStr for WindowType {
    type Err = FeatureError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rectangular" => Ok(Self::Rectangular),
            "hanning" => Ok(Self::Hanning),
            "hamming" => Ok(Self::Hamming),
            "povey" => Ok(Self::Povey),
            "blackman" => Ok(Self::Blackman {
                coeff: DEFAULT_BLACKMAN_COEFF,
            }),
            other => Err(FeatureError::config(format!(
                "invalid window type '{other}'"
            ))),
        }
    }
}

impl Display for WindowType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rectangular => write!(f, "rectangular"),
            Self::Hanning => write!(f, "hanning"),
            Self::Hamming => write!(f, "hamming"),
            Self::Povey => write!(f, "povey"),
            Self::Blackman { coeff } => write!(f, "blackman({coeff})"),
        }
    }
}

/// How a waveform is sliced into analysis frames. Shift and length are in
/// milliseconds; everything in samples is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameExtractionOptions {
    /// Waveform sample rate in Hz.
    pub samp_freq: f32,
    #[serde(alias = "frame_shift_ms")]
    pub frame_shift: f32,
    #[serde(alias = "frame_length_ms")]
    pub frame_length: f32,
    /// Amplitude of the additive noise; 0 disables dithering.
    pub dither: f32,
    /// Base seed for the per-frame dither generator.
    pub dither_seed: u64,
    pub preemph_coeff: f32,
    pub remove_dc_offset: bool,
    pub window_type: WindowType,
    /// Zero-pad frames to the next power of two before the FFT.
    pub round_to_power_of_two: bool,
    /// Only emit frames that fit completely inside the waveform.
    pub snip_edges: bool,
    /// Lets the batch driver downsample waveforms recorded above `samp_freq`.
    pub allow_downsample: bool,
}

impl Default for FrameExtractionOptions {
    fn default() -> Self {
        Self {
            samp_freq: 16_000.0,
            frame_shift: 10.0,
            frame_length: 25.0,
            dither: 1.0,
            dither_seed: 0,
            preemph_coeff: 0.97,
            remove_dc_offset: true,
            window_type: WindowType::Povey,
            round_to_power_of_two: true,
            snip_edges: true,
            allow_downsample: false,
        }
    }
}

impl FrameExtractionOptions {
    /// Frame shift in samples.
    pub fn window_shift(&self) -> usize {
        ms_to_samples(self.samp_freq, self.frame_shift)
    }

    /// Frame length in samples.
    pub fn window_size(&self) -> usize {
        ms_to_samples(self.samp_freq, self.frame_length)
    }

    /// Length of the buffer handed to the FFT.
    pub fn padded_window_size(&self) -> usize {
        let size = self.window_size();
        if self.round_to_power_of_two {
            next_power_of_two(size)
        } else {
            size
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.samp_freq > 0.0,
            "sample frequency must be positive, got {}",
            self.samp_freq
        );
        ensure_config!(
            self.frame_shift > 0.0 && self.frame_length > 0.0,
            "frame shift ({} ms) and frame length ({} ms) must be positive",
            self.frame_shift,
            self.frame_length
        );
        ensure_config!(
            self.window_shift() >= 1,
            "frame shift of {} ms is shorter than one sample at {} Hz",
            self.frame_shift,
            self.samp_freq
        );
        ensure_config!(
            self.window_size() >= 2,
            "frame length of {} ms yields fewer than two samples at {} Hz",
            self.frame_length,
            self.samp_freq
        );
        ensure_config!(
            self.dither >= 0.0,
            "dither must be non-negative, got {}",
            self.dither
        );
        ensure_config!(
            (0.0..=1.0).contains(&self.preemph_coeff),
            "pre-emphasis coefficient must lie in [0, 1], got {}",
            self.preemph_coeff
        );
        if let WindowType::Blackman { coeff } = self.window_type {
            ensure_config!(coeff.is_finite(), "blackman coefficient must be finite");
        }
        Ok(())
    }
}

fn ms_to_samples(samp_freq: f32, ms: f32) -> usize {
    let samples = (samp_freq as f64 * ms as f64 / 1000.0).floor();
    if samples.is_finite() && samples > 0.0 {
        samples as usize
    } else {
        0
    }
}

/// Smallest power of two that is `>= n`. `n` must be positive.
pub fn next_power_of_two(n: usize) -> usize {
    debug_assert!(n > 0, "next_power_of_two expects a positive argument");
    n.next_power_of_two()
}

/// Number of frames emitted for a waveform of `num_samples` samples.
pub fn frame_count(num_samples: usize, opts: &FrameExtractionOptions) -> usize {
    let frame_shift = opts.window_shift();
    let frame_length = opts.window_size();
    if frame_shift == 0 {
        return 0;
    }
    if opts.snip_edges {
        if num_samples < frame_length {
            0
        } else {
            1 + (num_samples - frame_length) / frame_shift
        }
    } else {
        let mut num_frames = (num_samples + frame_shift / 2) / frame_shift;
        while num_frames > 0 {
            let end_sample = first_sample_of_frame(num_frames - 1, opts) + frame_length as i64;
            if end_sample <= num_samples as i64 {
                break;
            }
            num_frames -= 1;
        }
        num_frames
    }
}

/// Index of the first waveform sample covered by `frame`; negative when a
/// centered frame starts before the waveform.
pub fn first_sample_of_frame(frame: usize, opts: &FrameExtractionOptions) -> i64 {
    let frame_shift = opts.window_shift() as i64;
    if opts.snip_edges {
        frame as i64 * frame_shift
    } else {
        let midpoint = frame_shift * frame as i64 + frame_shift / 2;
        midpoint - (opts.window_size() / 2) as i64
    }
}

/// Mirror an out-of-range sample index back into `[0, len)`.
fn reflect_index(mut index: i64, len: i64) -> usize {
    while index < 0 || index >= len {
        if index < 0 {
            index = -index - 1;
        } else {
            index = 2 * len - 1 - index;
        }
    }
    index as usize
}

/// Slice frame `frame` out of `wave` and condition it.
///
/// `sample_offset` is the index of `wave[0]` within the full utterance. The
/// returned frame has length `padded_window_size()`; the log energy is only
/// captured when `want_raw_log_energy` is set and is measured before
/// pre-emphasis and windowing.
pub fn extract_window(
    sample_offset: usize,
    wave: &[f32],
    frame: usize,
    opts: &FrameExtractionOptions,
    window_function: &FeatureWindowFunction,
    want_raw_log_energy: bool,
) -> Result<(Vec<f32>, Option<f32>)> {
    if wave.is_empty() {
        return Err(FeatureError::config("cannot extract a frame from an empty waveform"));
    }
    let frame_length = opts.window_size();
    let padded_length = opts.padded_window_size();
    ensure_config!(
        window_function.len() == frame_length,
        "window function has {} samples but frames have {}",
        window_function.len(),
        frame_length
    );

    let start_sample = first_sample_of_frame(frame, opts);
    let wave_start = start_sample - sample_offset as i64;
    let wave_len = wave.len() as i64;
    if opts.snip_edges {
        ensure_config!(
            wave_start >= 0 && wave_start + frame_length as i64 <= wave_len,
            "frame {} spans samples [{}, {}) outside the waveform chunk at offset {} of length {}",
            frame,
            start_sample,
            start_sample + frame_length as i64,
            sample_offset,
            wave.len()
        );
    } else {
        ensure_config!(
            sample_offset == 0 || wave_start >= 0,
            "frame {} starts at sample {} before the waveform chunk offset {}",
            frame,
            start_sample,
            sample_offset
        );
    }

    let mut window = vec![0.0_f32; padded_length];
    if wave_start >= 0 && wave_start + frame_length as i64 <= wave_len {
        let start = wave_start as usize;
        window[..frame_length].copy_from_slice(&wave[start..start + frame_length]);
    } else {
        for (s, slot) in window[..frame_length].iter_mut().enumerate() {
            *slot = wave[reflect_index(wave_start + s as i64, wave_len)];
        }
    }

    let log_energy = process_window(
        opts,
        window_function,
        &mut window[..frame_length],
        frame,
        want_raw_log_energy,
    );
    Ok((window, log_energy))
}

/// Condition one frame in place: dither, DC removal, raw energy capture,
/// pre-emphasis, then the taper.
pub fn process_window(
    opts: &FrameExtractionOptions,
    window_function: &FeatureWindowFunction,
    window: &mut [f32],
    frame: usize,
    want_raw_log_energy: bool,
) -> Option<f32> {
    if opts.dither != 0.0 {
        dither_window(window, opts.dither, frame_seed(opts.dither_seed, frame));
    }

    if opts.remove_dc_offset {
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        window.iter_mut().for_each(|v| *v -= mean);
    }

    let log_energy = want_raw_log_energy.then(|| log_energy(window));

    if opts.preemph_coeff != 0.0 {
        preemphasize(window, opts.preemph_coeff);
    }

    window_function.apply(window);
    log_energy
}

/// Natural log of the frame energy, floored at [`FLOAT_MIN`].
pub fn log_energy(samples: &[f32]) -> f32 {
    let energy: f32 = samples.iter().map(|v| v * v).sum();
    energy.max(FLOAT_MIN).ln()
}

fn preemphasize(window: &mut [f32], coeff: f32) {
    for i in (1..window.len()).rev() {
        window[i] -= coeff * window[i - 1];
    }
    if let Some(first) = window.first_mut() {
        *first -= coeff * *first;
    }
}

/// Add uniform noise in `[-dither, dither)`.
pub fn dither_window(window: &mut [f32], dither: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for sample in window.iter_mut() {
        *sample += rng.gen_range(-1.0_f32..1.0) * dither;
    }
}

fn frame_seed(base: u64, frame: usize) -> u64 {
    base ^ (frame as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
