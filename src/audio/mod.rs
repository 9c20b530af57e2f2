//! Waveform input for the command-line driver.

pub mod decoder;
pub mod resample;

pub use decoder::decode_audio;
pub use resample::downsample;

/// Decoded samples are normalized to [-1, 1]; features are computed on the
/// 16-bit integer scale so that dither and energy thresholds keep their
/// customary magnitudes.
pub const PCM16_SCALE: f32 = 32768.0;

/// Decoded audio with each channel kept separate.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveData {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl WaveData {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel, or `None` when the channel does not exist.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// One channel rescaled to 16-bit integer magnitudes.
    pub fn channel_pcm16(&self, index: usize) -> Option<Vec<f32>> {
        self.channel(index)
            .map(|samples| samples.iter().map(|&s| s * PCM16_SCALE).collect())
    }

    pub fn duration_secs(&self) -> f32 {
        let samples = self.channels.first().map_or(0, Vec::len);
        samples as f32 / self.sample_rate.max(1) as f32
    }
}
