use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::fbank::{FbankComputer, FbankOptions};
use super::frame::FrameExtractionOptions;
use super::mfcc::{MfccComputer, MfccOptions};
use super::spectrogram::{SpectrogramComputer, SpectrogramOptions};
use crate::error::{FeatureError, Result};

/// Capability shared by every per-frame spectral feature.
pub trait SpectralFeature {
    /// Number of columns of every output row.
    fn dimension(&self) -> usize;

    /// Whether the segmenter must capture log energy before pre-emphasis.
    fn needs_raw_log_energy(&self) -> bool;

    fn frame_options(&self) -> &FrameExtractionOptions;

    /// Turn one conditioned, zero-padded frame into a feature vector, with
    /// the mel stage (if any) warped by `vtln_warp`.
    fn compute_warped(&self, raw_log_energy: f32, vtln_warp: f32, frame: &[f32])
        -> Result<Vec<f32>>;

    fn compute(&self, raw_log_energy: f32, frame: &[f32]) -> Result<Vec<f32>> {
        self.compute_warped(raw_log_energy, 1.0, frame)
    }
}

pub(crate) fn floor_log_energy(log_energy: f32, log_energy_floor: Option<f32>) -> f32 {
    match log_energy_floor {
        Some(floor) if log_energy < floor => floor,
        _ => log_energy,
    }
}

/// Which feature a computer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Mfcc,
    Fbank,
    #[serde(alias = "spectrogram")]
    Stft,
}

impl FromStr for FeatureKind {
    type Err = FeatureError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mfcc" => Ok(Self::Mfcc),
            "fbank" => Ok(Self::Fbank),
            "stft" | "spectrogram" => Ok(Self::Stft),
            other => Err(FeatureError::config(format!(
                "unknown feature type '{other}'"
            ))),
        }
    }
}

impl Display for FeatureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mfcc => "mfcc",
            Self::Fbank => "fbank",
            Self::Stft => "stft",
        };
        f.write_str(name)
    }
}

/// Closed set of feature computers selected at configuration time.
#[derive(Debug)]
pub enum FeatureComputer {
    Mfcc(MfccComputer),
    Fbank(FbankComputer),
    Spectrogram(SpectrogramComputer),
}

impl FeatureComputer {
    pub fn mfcc(opts: MfccOptions) -> Result<Self> {
        MfccComputer::new(opts).map(Self::Mfcc)
    }

    pub fn fbank(opts: FbankOptions) -> Result<Self> {
        FbankComputer::new(opts).map(Self::Fbank)
    }

    pub fn spectrogram(opts: SpectrogramOptions) -> Result<Self> {
        SpectrogramComputer::new(opts).map(Self::Spectrogram)
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Mfcc(_) => FeatureKind::Mfcc,
            Self::Fbank(_) => FeatureKind::Fbank,
            Self::Spectrogram(_) => FeatureKind::Stft,
        }
    }

    fn inner(&self) -> &dyn SpectralFeature {
        match self {
            Self::Mfcc(computer) => computer,
            Self::Fbank(computer) => computer,
            Self::Spectrogram(computer) => computer,
        }
    }
}

impl SpectralFeature for FeatureComputer {
    fn dimension(&self) -> usize {
        self.inner().dimension()
    }

    fn needs_raw_log_energy(&self) -> bool {
        self.inner().needs_raw_log_energy()
    }

    fn frame_options(&self) -> &FrameExtractionOptions {
        self.inner().frame_options()
    }

    fn compute_warped(&self, raw_log_energy: f32, vtln_warp: f32, frame: &[f32]) -> Result<Vec<f32>> {
        self.inner().compute_warped(raw_log_energy, vtln_warp, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::mel::MelBanksOptions;

    #[test]
    fn parses_historical_type_names() {
        assert_eq!("mfcc".parse::<FeatureKind>().unwrap(), FeatureKind::Mfcc);
        assert_eq!("FBANK".parse::<FeatureKind>().unwrap(), FeatureKind::Fbank);
        assert_eq!("stft".parse::<FeatureKind>().unwrap(), FeatureKind::Stft);
        assert!("plp".parse::<FeatureKind>().unwrap_err().is_configuration());
    }

    #[test]
    fn variants_report_their_dimensions() {
        let mfcc = FeatureComputer::mfcc(MfccOptions::default()).unwrap();
        assert_eq!((mfcc.kind(), mfcc.dimension()), (FeatureKind::Mfcc, 13));

        let fbank = FeatureComputer::fbank(FbankOptions {
            mel_opts: MelBanksOptions::with_bins(40),
            ..FbankOptions::default()
        })
        .unwrap();
        assert_eq!(fbank.dimension(), 41);

        let stft = FeatureComputer::spectrogram(SpectrogramOptions::default()).unwrap();
        assert_eq!(stft.dimension(), 257);
    }

    #[test]
    fn floor_only_raises_energy() {
        assert_eq!(floor_log_energy(-5.0, Some(-1.0)), -1.0);
        assert_eq!(floor_log_energy(3.0, Some(-1.0)), 3.0);
        assert_eq!(floor_log_energy(-5.0, None), -5.0);
    }
}
