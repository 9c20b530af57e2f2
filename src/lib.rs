//! Kaldi-compatible speech feature extraction: MFCC, log mel filterbank and
//! log power spectrum computers, plus delta, sliding-window CMN and energy
//! VAD post-processors.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod table;
pub mod transforms;

pub use error::{FeatureError, Result};
pub use features::{
    FbankOptions, FeatureComputer, FeatureKind, FeatureMatrix, FeaturePipeline,
    FrameExtractionOptions, MelBanksOptions, MfccOptions, SpectralFeature, SpectrogramOptions,
    WindowType,
};
pub use transforms::{
    compute_deltas, compute_vad_energy, sliding_window_cmn, DeltaFeatureOptions,
    SlidingWindowCmnOptions, VadEnergyOptions,
};
