use serde::{Deserialize, Serialize};

use super::computer::{floor_log_energy, SpectralFeature};
use super::frame::{log_energy, FrameExtractionOptions};
use super::mel::{MelBankCache, MelBanksOptions};
use super::spectrum::PowerSpectrum;
use super::EPSILON;
use crate::error::{ensure_config, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FbankOptions {
    pub frame_opts: FrameExtractionOptions,
    pub mel_opts: MelBanksOptions,
    /// Prepend the frame log energy as column 0.
    pub use_energy: bool,
    pub energy_floor: f32,
    pub raw_energy: bool,
    pub use_log_fbank: bool,
    /// Use the power spectrum; magnitudes are used otherwise.
    pub use_power: bool,
}

impl Default for FbankOptions {
    fn default() -> Self {
        Self {
            frame_opts: FrameExtractionOptions::default(),
            mel_opts: MelBanksOptions::with_bins(23),
            use_energy: true,
            energy_floor: 0.0,
            raw_energy: true,
            use_log_fbank: true,
            use_power: true,
        }
    }
}

/// Log mel filterbank energies.
#[derive(Debug)]
pub struct FbankComputer {
    opts: FbankOptions,
    log_energy_floor: Option<f32>,
    spectrum: PowerSpectrum,
    mel_banks: MelBankCache,
}

impl FbankComputer {
    pub fn new(opts: FbankOptions) -> Result<Self> {
        opts.frame_opts.validate()?;
        let log_energy_floor = (opts.energy_floor > 0.0).then(|| opts.energy_floor.ln());
        let spectrum = PowerSpectrum::new(opts.frame_opts.padded_window_size());
        let mel_banks = MelBankCache::new();
        mel_banks.get_or_build(&opts.mel_opts, &opts.frame_opts, 1.0)?;
        Ok(Self {
            opts,
            log_energy_floor,
            spectrum,
            mel_banks,
        })
    }

    pub fn options(&self) -> &FbankOptions {
        &self.opts
    }
}

impl SpectralFeature for FbankComputer {
    fn dimension(&self) -> usize {
        self.opts.mel_opts.num_bins + usize::from(self.opts.use_energy)
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

        let mut spectrum = self.spectrum.compute(frame);
        if !self.opts.use_power {
            spectrum.iter_mut().for_each(|p| *p = p.sqrt());
        }

        let mel_banks =
            self.mel_banks
                .get_or_build(&self.opts.mel_opts, &self.opts.frame_opts, vtln_warp)?;
        let offset = usize::from(self.opts.use_energy);
        let mut feature = vec![0.0; self.dimension()];
        mel_banks.compute_into(&spectrum, &mut feature[offset..]);

        if self.opts.use_log_fbank {
            feature[offset..]
                .iter_mut()
                .for_each(|e| *e = e.max(EPSILON).ln());
        }
        if self.opts.use_energy {
            feature[0] = floor_log_energy(signal_log_energy, self.log_energy_floor);
        }
        Ok(feature)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn opts() -> FbankOptions {
        FbankOptions {
            frame_opts: FrameExtractionOptions {
                dither: 0.0,
                ..FrameExtractionOptions::default()
            },
            ..FbankOptions::default()
        }
    }

    #[test]
    fn dimension_counts_energy_column() {
        assert_eq!(FbankComputer::new(opts()).unwrap().dimension(), 24);
        let without = FbankComputer::new(FbankOptions {
            use_energy: false,
            ..opts()
        })
        .unwrap();
        assert_eq!(without.dimension(), 23);
        assert!(!without.needs_raw_log_energy());
    }

    #[test]
    fn silent_frame_hits_epsilon_floor() {
        let computer = FbankComputer::new(opts()).unwrap();
        let feature = computer.compute(-3.0, &vec![0.0_f32; 512]).unwrap();
        assert_eq!(feature[0], -3.0);
        assert!(feature[1..].iter().all(|&v| v == EPSILON.ln()));
    }

    #[test]
    fn linear_fbank_skips_log() {
        let computer = FbankComputer::new(FbankOptions {
            use_log_fbank: false,
            use_energy: false,
            ..opts()
        })
        .unwrap();
        let mut frame = vec![0.0_f32; 512];
        frame[0] = 1.0;
        let feature = computer.compute(0.0, &frame).unwrap();
        let bank = computer
            .mel_banks
            .get_or_build(&computer.opts.mel_opts, &computer.opts.frame_opts, 1.0)
            .unwrap();
        for (value, bin) in feature.iter().zip(bank.bins()) {
            assert_abs_diff_eq!(*value, bin.weights.iter().sum::<f32>(), epsilon = 1e-5);
        }
    }

    #[test]
    fn non_raw_energy_is_measured_on_the_frame() {
        let computer = FbankComputer::new(FbankOptions {
            raw_energy: false,
            ..opts()
        })
        .unwrap();
        assert!(!computer.needs_raw_log_energy());
        let frame = vec![0.5_f32; 512];
        let feature = computer.compute(0.0, &frame).unwrap();
        assert_abs_diff_eq!(feature[0], (512.0_f32 * 0.25).ln(), epsilon = 1e-5);
    }
}
