//! JSON configuration for the `speechfeat` driver.
//!
//! One file groups every option section; any subset may be given and the
//! rest fall back to defaults. Frame and mel options are shared by the three
//! spectral features.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::features::{
    FbankOptions, FeatureComputer, FeatureKind, FrameExtractionOptions, MelBanksOptions,
    MfccOptions, SpectrogramOptions,
};
use crate::transforms::{DeltaFeatureOptions, SlidingWindowCmnOptions, VadEnergyOptions};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    pub frame: FrameExtractionOptions,
    /// Mel options; when absent MFCC and FBank use their own 23-bin default.
    pub mel: Option<MelBanksOptions>,
    pub mfcc: MfccSection,
    pub fbank: FbankSection,
    pub spectrogram: SpectrogramSection,
    pub delta: DeltaFeatureOptions,
    pub cmvn: SlidingWindowCmnOptions,
    pub vad: VadEnergyOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccSection {
    pub num_ceps: usize,
    pub use_energy: bool,
    pub energy_floor: f32,
    pub raw_energy: bool,
    pub cepstral_lifter: f32,
}

impl Default for MfccSection {
    fn default() -> Self {
        let defaults = MfccOptions::default();
        Self {
            num_ceps: defaults.num_ceps,
            use_energy: defaults.use_energy,
            energy_floor: defaults.energy_floor,
            raw_energy: defaults.raw_energy,
            cepstral_lifter: defaults.cepstral_lifter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FbankSection {
    pub use_energy: bool,
    pub energy_floor: f32,
    pub raw_energy: bool,
    pub use_log_fbank: bool,
    pub use_power: bool,
}

impl Default for FbankSection {
    fn default() -> Self {
        let defaults = FbankOptions::default();
        Self {
            use_energy: defaults.use_energy,
            energy_floor: defaults.energy_floor,
            raw_energy: defaults.raw_energy,
            use_log_fbank: defaults.use_log_fbank,
            use_power: defaults.use_power,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramSection {
    pub energy_floor: f32,
    pub raw_energy: bool,
}

impl Default for SpectrogramSection {
    fn default() -> Self {
        let defaults = SpectrogramOptions::default();
        Self {
            energy_floor: defaults.energy_floor,
            raw_energy: defaults.raw_energy,
        }
    }
}

impl FeatureConfig {
    pub fn mfcc_options(&self) -> MfccOptions {
        let defaults = MfccOptions::default();
        MfccOptions {
            frame_opts: self.frame.clone(),
            mel_opts: self.mel.clone().unwrap_or(defaults.mel_opts),
            num_ceps: self.mfcc.num_ceps,
            use_energy: self.mfcc.use_energy,
            energy_floor: self.mfcc.energy_floor,
            raw_energy: self.mfcc.raw_energy,
            cepstral_lifter: self.mfcc.cepstral_lifter,
        }
    }

    pub fn fbank_options(&self) -> FbankOptions {
        let defaults = FbankOptions::default();
        FbankOptions {
            frame_opts: self.frame.clone(),
            mel_opts: self.mel.clone().unwrap_or(defaults.mel_opts),
            use_energy: self.fbank.use_energy,
            energy_floor: self.fbank.energy_floor,
            raw_energy: self.fbank.raw_energy,
            use_log_fbank: self.fbank.use_log_fbank,
            use_power: self.fbank.use_power,
        }
    }

    pub fn spectrogram_options(&self) -> SpectrogramOptions {
        SpectrogramOptions {
            frame_opts: self.frame.clone(),
            energy_floor: self.spectrogram.energy_floor,
            raw_energy: self.spectrogram.raw_energy,
        }
    }

    /// Build the computer for `kind`; option validation errors surface here.
    pub fn build_computer(&self, kind: FeatureKind) -> Result<FeatureComputer> {
        let computer = match kind {
            FeatureKind::Mfcc => FeatureComputer::mfcc(self.mfcc_options()),
            FeatureKind::Fbank => FeatureComputer::fbank(self.fbank_options()),
            FeatureKind::Stft => FeatureComputer::spectrogram(self.spectrogram_options()),
        };
        computer.with_context(|| format!("Invalid {kind} configuration"))
    }
}

/// Load the configuration from a file, from inline JSON, or fall back to
/// defaults when neither is given. The file wins when both are present.
pub fn load_config_from_sources(path: Option<&Path>, json: Option<&str>) -> Result<FeatureConfig> {
    if let Some(p) = path {
        let data =
            fs::read_to_string(p).with_context(|| format!("Failed to read config file {:?}", p))?;
        return parse_feature_config(&data);
    }

    if let Some(raw) = json {
        return parse_feature_config(raw);
    }

    Ok(FeatureConfig::default())
}

pub fn parse_feature_config(raw: &str) -> Result<FeatureConfig> {
    if raw.trim().is_empty() {
        bail!("Feature configuration is empty");
    }
    let config: FeatureConfig =
        serde_json::from_str(raw).context("Failed to parse feature configuration JSON")?;
    Ok(config)
}
