use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::computer::{floor_log_energy, SpectralFeature};
use super::frame::{log_energy, FrameExtractionOptions};
use super::mel::{MelBankCache, MelBanksOptions};
use super::spectrum::{compute_dct_matrix, compute_lifter_coeffs, PowerSpectrum};
use super::EPSILON;
use crate::error::{ensure_config, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccOptions {
    pub frame_opts: FrameExtractionOptions,
    pub mel_opts: MelBanksOptions,
    pub num_ceps: usize,
    /// Replace C0 with the frame log energy.
    pub use_energy: bool,
    /// Floor on the energy (absolute, not relative); 0 disables it.
    pub energy_floor: f32,
    /// Measure energy before pre-emphasis and windowing.
    pub raw_energy: bool,
    /// Lifter constant Q; 0 disables liftering.
    pub cepstral_lifter: f32,
}

impl Default for MfccOptions {
    fn default() -> Self {
        Self {
            frame_opts: FrameExtractionOptions::default(),
            mel_opts: MelBanksOptions::with_bins(23),
            num_ceps: 13,
            use_energy: true,
            energy_floor: 0.0,
            raw_energy: true,
            cepstral_lifter: 22.0,
        }
    }
}

/// Mel-frequency cepstral coefficients.
#[derive(Debug)]
pub struct MfccComputer {
    opts: MfccOptions,
    dct_matrix: Array2<f32>,
    lifter_coeffs: Option<Vec<f32>>,
    log_energy_floor: Option<f32>,
    spectrum: PowerSpectrum,
    mel_banks: MelBankCache,
}

impl MfccComputer {
    pub fn new(opts: MfccOptions) -> Result<Self> {
        let num_bins = opts.mel_opts.num_bins;
        ensure_config!(opts.num_ceps > 0, "num-ceps must be positive");
        ensure_config!(
            opts.num_ceps <= num_bins,
            "num-ceps {} cannot be larger than num-mel-bins {}",
            opts.num_ceps,
            num_bins
        );
        opts.frame_opts.validate()?;

        let full_dct = compute_dct_matrix(num_bins);
        let dct_matrix = full_dct.slice(ndarray::s![..opts.num_ceps, ..]).to_owned();
        let lifter_coeffs = (opts.cepstral_lifter != 0.0)
            .then(|| compute_lifter_coeffs(opts.cepstral_lifter, opts.num_ceps));
        let log_energy_floor = (opts.energy_floor > 0.0).then(|| opts.energy_floor.ln());
        let spectrum = PowerSpectrum::new(opts.frame_opts.padded_window_size());

        let mel_banks = MelBankCache::new();
        mel_banks.get_or_build(&opts.mel_opts, &opts.frame_opts, 1.0)?;

        Ok(Self {
            opts,
            dct_matrix,
            lifter_coeffs,
            log_energy_floor,
            spectrum,
            mel_banks,
        })
    }

    pub fn options(&self) -> &MfccOptions {
        &self.opts
    }
}

impl SpectralFeature for MfccComputer {
    fn dimension(&self) -> usize {
        self.opts.num_ceps
    }

    fn needs_raw_log_energy(&self) -> bool {
        self.opts.use_energy && self.opts.raw_energy
    }

    fn frame_options(&self) -> &FrameExtractionOptions {
        &self.opts.frame_opts
    }

    fn compute_warped(&self, raw_log_energy: f32, vtln_warp: f32, frame: &[f32]) -> Result<Vec<f32>> {
        let padded = self.opts.frame_opts.padded_window_size();
        ensure_config!(
            frame.len() == padded,
            "frame has {} samples, expected {}",
            frame.len(),
            padded
        );

        let signal_log_energy = if self.opts.use_energy && !self.opts.raw_energy {
            log_energy(frame)
        } else {
            raw_log_energy
        };

        let power_spectrum = self.spectrum.compute(frame);
        let mel_banks =
            self.mel_banks
                .get_or_build(&self.opts.mel_opts, &self.opts.frame_opts, vtln_warp)?;
        let mel_energies: Array1<f32> = mel_banks
            .compute(&power_spectrum)
            .into_iter()
            .map(|e| e.max(EPSILON).ln())
            .collect();

        let mut feature = self.dct_matrix.dot(&mel_energies).to_vec();
        if let Some(lifter) = &self.lifter_coeffs {
            feature
                .iter_mut()
                .zip(lifter.iter())
                .for_each(|(c, l)| *c *= l);
        }
        if self.opts.use_energy {
            feature[0] = floor_log_energy(signal_log_energy, self.log_energy_floor);
        }
        Ok(feature)
    }
}
