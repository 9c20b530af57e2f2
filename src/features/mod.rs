//! Frame-synchronous spectral features: MFCC, log mel filterbank and log
//! power spectrum.

pub mod computer;
pub mod fbank;
pub mod frame;
pub mod mel;
pub mod mfcc;
pub mod pipeline;
pub mod spectrogram;
pub mod spectrum;
pub mod window;

use ndarray::Array2;

pub use computer::{FeatureComputer, FeatureKind, SpectralFeature};
pub use fbank::{FbankComputer, FbankOptions};
pub use frame::{frame_count, next_power_of_two, FrameExtractionOptions, WindowType};
pub use mel::{MelBankCache, MelBanksOptions, MelFilterBank};
pub use mfcc::{MfccComputer, MfccOptions};
pub use pipeline::FeaturePipeline;
pub use spectrogram::{SpectrogramComputer, SpectrogramOptions};
pub use window::FeatureWindowFunction;

/// Rows are frames in temporal order; the column count is fixed per computer.
pub type FeatureMatrix = Array2<f32>;

/// Floor applied to mel and spectral energies before taking the log.
pub const EPSILON: f32 = 1e-8;

/// Floor applied to frame energies before taking the log (smallest normal f32).
pub const FLOAT_MIN: f32 = f32::MIN_POSITIVE;
