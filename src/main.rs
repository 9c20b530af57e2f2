use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use speechfeat::audio::{self, WaveData};
use speechfeat::cli::{ArchiveArgs, Cli, CmvnArgs, Command, ComputeArgs, DeltaArgs, VadArgs};
use speechfeat::config::FeatureConfig;
use speechfeat::features::{FeatureKind, FeaturePipeline, SpectralFeature};
use speechfeat::table::{self, ArchiveWriter, FeatureRecord, VadRecord};
use speechfeat::transforms::{compute_deltas, compute_vad_energy, sliding_window_cmn};
use speechfeat::FeatureMatrix;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    println!("speechfeat v{}", env!("CARGO_PKG_VERSION"));
    let kind = cli.command.feature_kind();
    match &cli.command {
        Command::ComputeMfcc(args) | Command::ComputeFbank(args) | Command::ComputeSpectrogram(args) => {
            let kind = kind.context("compute subcommand without a feature type")?;
            run_compute(kind, args)
        }
        Command::ComputeVad(args) => run_vad(args),
        Command::AddDeltas(args) => run_add_deltas(args),
        Command::ApplyCmvnSliding(args) => run_cmvn(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_compute(kind: FeatureKind, args: &ComputeArgs) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    let config = args
        .config
        .load()
        .context("Failed to load feature configuration")?;
    let computer = config.build_computer(kind)?;
    let frame_opts = computer.frame_options().clone();
    let pipeline = FeaturePipeline::new(computer).context("Failed to build feature pipeline")?;

    println!("Feature type: {} ({} dims)", kind, pipeline.dimension());
    println!("Wave list: {:?}", args.wav_list);
    println!("Output: {:?}", args.output);

    let entries = table::read_scp(&args.wav_list)?;
    let target_rate = frame_opts.samp_freq.round() as u32;
    let mut writer = ArchiveWriter::create(&args.output)?;
    let mut num_done = 0usize;

    for entry in &entries {
        let wave = match audio::decode_audio(&entry.path) {
            Ok(wave) => wave,
            Err(err) => {
                warn!(key = %entry.key, "failed to decode audio: {err:#}");
                continue;
            }
        };
        let samples = match select_samples(&wave, args.channel, target_rate, frame_opts.allow_downsample) {
            Ok(samples) => samples,
            Err(err) => {
                warn!(key = %entry.key, "skipping utterance: {err:#}");
                continue;
            }
        };

        let features = match pipeline.compute_features(&samples, target_rate, args.vtln_warp) {
            Ok(features) => features,
            Err(err) => {
                warn!(key = %entry.key, "failed to compute features: {err}");
                continue;
            }
        };
        debug!(key = %entry.key, frames = features.nrows(), "computed features");
        writer.write_matrix(&entry.key, &features)?;
        num_done += 1;
    }
    writer.finish()?;

    println!("Done {} out of {} utterances", num_done, entries.len());
    if num_done == 0 && !entries.is_empty() {
        bail!("No utterances were processed successfully");
    }
    Ok(())
}

/// Pick one channel and bring it to the configured sample rate.
fn select_samples(
    wave: &WaveData,
    channel: usize,
    target_rate: u32,
    allow_downsample: bool,
) -> Result<Vec<f32>> {
    let Some(samples) = wave.channel_pcm16(channel) else {
        bail!(
            "channel {} requested but the audio has {} channel(s)",
            channel,
            wave.num_channels()
        );
    };
    if wave.sample_rate == target_rate {
        return Ok(samples);
    }
    if wave.sample_rate > target_rate && allow_downsample {
        info!(
            from = wave.sample_rate,
            to = target_rate,
            "downsampling waveform"
        );
        return audio::downsample(&samples, wave.sample_rate, target_rate);
    }
    bail!(
        "sample rate {} Hz does not match configured {} Hz{}",
        wave.sample_rate,
        target_rate,
        if wave.sample_rate > target_rate {
            " (set allow_downsample to resample)"
        } else {
            ""
        }
    )
}

fn load_archive_config(args: &ArchiveArgs) -> Result<FeatureConfig> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    args.config
        .load()
        .context("Failed to load feature configuration")
}

fn read_matrices(path: &Path) -> Result<Vec<(String, FeatureMatrix)>> {
    let records: Vec<FeatureRecord> = table::read_archive(path)?;
    records
        .into_iter()
        .map(|record| {
            let matrix = record.to_matrix()?;
            Ok((record.key, matrix))
        })
        .collect()
}

fn run_vad(args: &VadArgs) -> Result<()> {
    let mut config = load_archive_config(&args.archive)?;
    args.apply_overrides(&mut config);
    config
        .vad
        .validate()
        .context("Invalid voice activity detection options")?;

    let utterances = read_matrices(&args.archive.input)?;
    let mut writer = ArchiveWriter::create(&args.archive.output)?;
    let (mut num_done, mut num_err, mut num_unvoiced) = (0usize, 0usize, 0usize);
    let (mut total_voiced, mut total_frames) = (0.0_f64, 0usize);

    for (key, features) in &utterances {
        if features.nrows() == 0 {
            warn!(key = %key, "empty features for utterance");
            num_err += 1;
            continue;
        }
        let decisions = compute_vad_energy(&config.vad, features)?;
        let voiced: f64 = decisions.iter().map(|&d| d as f64).sum();
        if voiced == 0.0 {
            warn!(key = %key, "no frames were judged voiced");
            num_unvoiced += 1;
        }
        total_voiced += voiced;
        total_frames += decisions.len();
        writer.write_record(&VadRecord {
            key: key.clone(),
            decisions,
        })?;
        num_done += 1;
    }
    writer.finish()?;

    println!(
        "Applied energy based voice activity detection; processed {} utterances successfully; {} had empty features, and {} were completely unvoiced.",
        num_done, num_err, num_unvoiced
    );
    if total_frames > 0 {
        println!(
            "Proportion of voiced frames was {:.4} over {} frames.",
            total_voiced / total_frames as f64,
            total_frames
        );
    }
    if num_done == 0 && !utterances.is_empty() {
        bail!("No utterances were processed successfully");
    }
    Ok(())
}

fn run_add_deltas(args: &DeltaArgs) -> Result<()> {
    let mut config = load_archive_config(&args.archive)?;
    args.apply_overrides(&mut config);
    let written = transform_archive(&args.archive, |features| {
        compute_deltas(config.delta, features)
    })?;
    println!(
        "Added order-{} deltas (window {}) to {} utterances",
        config.delta.order, config.delta.window, written
    );
    Ok(())
}

fn run_cmvn(args: &CmvnArgs) -> Result<()> {
    let mut config = load_archive_config(&args.archive)?;
    args.apply_overrides(&mut config);
    let written = transform_archive(&args.archive, |features| {
        sliding_window_cmn(&config.cmvn, features)
    })?;
    println!(
        "Applied sliding-window CMN (window {}, centered: {}, variance: {}) to {} utterances",
        config.cmvn.cmn_window, config.cmvn.center, config.cmvn.normalize_variance, written
    );
    Ok(())
}

fn transform_archive<F>(args: &ArchiveArgs, transform: F) -> Result<usize>
where
    F: Fn(&FeatureMatrix) -> speechfeat::Result<FeatureMatrix>,
{
    let utterances = read_matrices(&args.input)?;
    let mut writer = ArchiveWriter::create(&args.output)?;
    for (key, features) in &utterances {
        let output =
            transform(features).with_context(|| format!("Failed to process utterance '{key}'"))?;
        writer.write_matrix(key, &output)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(sample_rate: u32, channels: usize) -> WaveData {
        WaveData {
            channels: (0..channels).map(|c| vec![0.5 / (c + 1) as f32; 4800]).collect(),
            sample_rate,
        }
    }

    #[test]
    fn selects_requested_channel_on_pcm16_scale() {
        let samples = select_samples(&wave(16_000, 2), 1, 16_000, false).unwrap();
        assert_eq!(samples.len(), 4800);
        assert_eq!(samples[0], 8192.0);
    }

    #[test]
    fn missing_channel_is_an_error() {
        let err = select_samples(&wave(16_000, 1), 1, 16_000, false).unwrap_err();
        assert!(err.to_string().contains("1 channel"));
    }

    #[test]
    fn higher_rate_requires_allow_downsample() {
        assert!(select_samples(&wave(48_000, 1), 0, 16_000, false).is_err());
        let samples = select_samples(&wave(48_000, 1), 0, 16_000, true).unwrap();
        assert_eq!(samples.len(), 1600);
    }

    #[test]
    fn lower_rate_is_always_rejected() {
        assert!(select_samples(&wave(8_000, 1), 0, 16_000, true).is_err());
    }
}
