use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::debug;

use super::WaveData;

/// Decode an audio file into per-channel f32 samples in [-1.0, 1.0].
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<WaveData> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;
    let mut format = probe_result.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found in file")?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate not specified in audio file")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err).context("Failed to read packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .context("Failed to decode audio packet")?;
        let num_channels = decoded.spec().channels.count();
        if channels.len() < num_channels {
            channels.resize_with(num_channels, Vec::new);
        }
        append_decoded(&decoded, &mut channels);
    }

    debug!(
        path = %path.display(),
        sample_rate,
        channels = channels.len(),
        samples = channels.first().map_or(0, Vec::len),
        "decoded waveform"
    );
    Ok(WaveData {
        channels,
        sample_rate,
    })
}

fn append_decoded(buffer: &AudioBufferRef<'_>, channels: &mut [Vec<f32>]) {
    match buffer {
        AudioBufferRef::U8(buf) => append_channels(&**buf, channels),
        AudioBufferRef::U16(buf) => append_channels(&**buf, channels),
        AudioBufferRef::U24(buf) => append_channels(&**buf, channels),
        AudioBufferRef::U32(buf) => append_channels(&**buf, channels),
        AudioBufferRef::S8(buf) => append_channels(&**buf, channels),
        AudioBufferRef::S16(buf) => append_channels(&**buf, channels),
        AudioBufferRef::S24(buf) => append_channels(&**buf, channels),
        AudioBufferRef::S32(buf) => append_channels(&**buf, channels),
        AudioBufferRef::F32(buf) => append_channels(&**buf, channels),
        AudioBufferRef::F64(buf) => append_channels(&**buf, channels),
    }
}

/// Channels are kept apart; nothing is mixed down.
fn append_channels<S>(buffer: &AudioBuffer<S>, channels: &mut [Vec<f32>])
where
    S: Sample + IntoSample<f32>,
{
    for (index, out) in channels.iter_mut().enumerate() {
        out.extend(buffer.chan(index).iter().map(|&s| s.into_sample()));
    }
}
