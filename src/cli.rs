use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{load_config_from_sources, FeatureConfig};
use crate::features::FeatureKind;

/// speechfeat - batch speech feature extraction
///
/// Reads a `key path` wave list, computes MFCC, log mel filterbank or log
/// power spectrum features per utterance, and post-processes JSON-lines
/// feature archives.
#[derive(Parser, Debug)]
#[command(name = "speechfeat", version, about = "Batch speech feature extraction", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute MFCC features for every utterance of a wave list.
    ComputeMfcc(ComputeArgs),
    /// Compute log mel filterbank features for every utterance of a wave list.
    ComputeFbank(ComputeArgs),
    /// Compute log power spectrum features for every utterance of a wave list.
    ComputeSpectrogram(ComputeArgs),
    /// Energy-based voice activity detection over a feature archive.
    ComputeVad(VadArgs),
    /// Append delta and higher-order regression features.
    AddDeltas(DeltaArgs),
    /// Sliding-window cepstral mean (and optionally variance) normalization.
    ApplyCmvnSliding(CmvnArgs),
}

impl Command {
    /// Feature type produced by the compute-* subcommands.
    pub fn feature_kind(&self) -> Option<FeatureKind> {
        match self {
            Self::ComputeMfcc(_) => Some(FeatureKind::Mfcc),
            Self::ComputeFbank(_) => Some(FeatureKind::Fbank),
            Self::ComputeSpectrogram(_) => Some(FeatureKind::Stft),
            _ => None,
        }
    }
}

/// Where the JSON feature configuration comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a JSON feature configuration
    #[arg(long, value_name = "PATH", conflicts_with = "config_json")]
    pub config: Option<PathBuf>,

    /// Inline JSON feature configuration
    #[arg(long, value_name = "JSON", conflicts_with = "config")]
    pub config_json: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<FeatureConfig> {
        load_config_from_sources(self.config.as_deref(), self.config_json.as_deref())
    }

    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.config {
            ensure_file(path, "Config file")?;
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ComputeArgs {
    /// Wave list with one `<key> <audio path>` pair per line
    #[arg(value_name = "WAV_LIST")]
    pub wav_list: PathBuf,

    /// Output JSON-lines feature archive
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Channel to extract from multi-channel audio (0-based)
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// VTLN warp factor applied to the mel filterbank
    #[arg(long, default_value_t = 1.0)]
    pub vtln_warp: f32,
}

impl ComputeArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_file(&self.wav_list, "Wave list")?;
        ensure_output(&self.output)?;
        self.config.validate()?;
        ensure!(
            self.vtln_warp > 0.0,
            "VTLN warp factor must be positive, got: {}",
            self.vtln_warp
        );
        Ok(())
    }
}

/// Input and output archives shared by the matrix post-processors.
#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    /// Input JSON-lines feature archive
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output JSON-lines archive
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ArchiveArgs {
    pub fn validate(&self) -> Result<()> {
        ensure_file(&self.input, "Input archive")?;
        ensure_output(&self.output)?;
        if self.input == self.output {
            bail!("Input and output archives must differ: {:?}", self.input);
        }
        self.config.validate()
    }
}

#[derive(Args, Debug, Clone)]
pub struct VadArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Override the constant term of the energy threshold
    #[arg(long)]
    pub vad_energy_threshold: Option<f32>,

    /// Override the weight of the mean log energy in the threshold
    #[arg(long)]
    pub vad_energy_mean_scale: Option<f32>,

    /// Override the number of context frames on each side
    #[arg(long)]
    pub vad_frames_context: Option<usize>,

    /// Override the proportion of context frames that must be above threshold
    #[arg(long)]
    pub vad_proportion_threshold: Option<f32>,
}

impl VadArgs {
    pub fn apply_overrides(&self, config: &mut FeatureConfig) {
        if let Some(value) = self.vad_energy_threshold {
            config.vad.vad_energy_threshold = value;
        }
        if let Some(value) = self.vad_energy_mean_scale {
            config.vad.vad_energy_mean_scale = value;
        }
        if let Some(value) = self.vad_frames_context {
            config.vad.vad_frames_context = value;
        }
        if let Some(value) = self.vad_proportion_threshold {
            config.vad.vad_proportion_threshold = value;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeltaArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Override the highest derivative order
    #[arg(long)]
    pub delta_order: Option<usize>,

    /// Override the regression half-window
    #[arg(long)]
    pub delta_window: Option<usize>,
}

impl DeltaArgs {
    pub fn apply_overrides(&self, config: &mut FeatureConfig) {
        if let Some(order) = self.delta_order {
            config.delta.order = order;
        }
        if let Some(window) = self.delta_window {
            config.delta.window = window;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CmvnArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Override the window length in frames
    #[arg(long)]
    pub cmn_window: Option<usize>,

    /// Override the minimum window at the start of the utterance
    #[arg(long)]
    pub min_cmn_window: Option<usize>,

    /// Center the window on the current frame
    #[arg(long)]
    pub center: bool,

    /// Normalize variance as well as mean
    #[arg(long)]
    pub norm_vars: bool,
}

impl CmvnArgs {
    pub fn apply_overrides(&self, config: &mut FeatureConfig) {
        if let Some(window) = self.cmn_window {
            config.cmvn.cmn_window = window;
        }
        if let Some(window) = self.min_cmn_window {
            config.cmvn.min_window = window;
        }
        config.cmvn.center |= self.center;
        config.cmvn.normalize_variance |= self.norm_vars;
    }
}

fn ensure_file(path: &Path, label: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist: {:?}", label, path);
    }
    if !path.is_file() {
        bail!("{} is not a file: {:?}", label, path);
    }
    Ok(())
}

fn ensure_output(path: &Path) -> Result<()> {
    if path.is_dir() {
        bail!("Output path must be a file, not a directory: {:?}", path);
    }
    Ok(())
}
