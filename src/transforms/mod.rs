//! Post-processors applied to a finished feature matrix.

pub mod cmvn;
pub mod delta;
pub mod vad;

pub use cmvn::{sliding_window_cmn, SlidingWindowCmnOptions};
pub use delta::{compute_deltas, DeltaFeatureOptions, DeltaFeatures};
pub use vad::{compute_vad_energy, VadEnergyOptions};
