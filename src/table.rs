//! Driver-side tables: the `key path` wave list and the JSON-lines archive
//! that holds one feature matrix (or VAD decision vector) per utterance.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::features::FeatureMatrix;

/// One line of a wave list: utterance key and audio file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpEntry {
    pub key: String,
    pub path: PathBuf,
}

/// Read a wave list. Blank lines and lines starting with `#` are skipped;
/// relative paths are resolved against the list's directory.
pub fn read_scp(path: &Path) -> Result<Vec<ScpEntry>> {
    let file = File::open(path).with_context(|| format!("Failed to open wave list {:?}", path))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mut entries = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {:?}", path))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, audio)) = line.split_once(char::is_whitespace) else {
            bail!("{:?}:{}: expected '<key> <path>', got '{}'", path, line_no + 1, line);
        };
        let audio = PathBuf::from(audio.trim());
        let audio = if audio.is_relative() {
            base.join(audio)
        } else {
            audio
        };
        entries.push(ScpEntry {
            key: key.to_string(),
            path: audio,
        });
    }
    Ok(entries)
}

/// Row-major feature matrix as stored in the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub key: String,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl FeatureRecord {
    pub fn from_matrix(key: impl Into<String>, matrix: &FeatureMatrix) -> Self {
        let (rows, cols) = matrix.dim();
        Self {
            key: key.into(),
            rows,
            cols,
            data: matrix.iter().copied().collect(),
        }
    }

    pub fn to_matrix(&self) -> Result<FeatureMatrix> {
        ensure!(
            self.data.len() == self.rows * self.cols,
            "record '{}' holds {} values, expected {}x{}",
            self.key,
            self.data.len(),
            self.rows,
            self.cols
        );
        Array2::from_shape_vec((self.rows, self.cols), self.data.clone())
            .with_context(|| format!("Malformed matrix for '{}'", self.key))
    }
}

/// Per-frame voice activity decisions (1.0 voiced, 0.0 unvoiced).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VadRecord {
    pub key: String,
    pub decisions: Vec<f32>,
}

/// Writes one JSON document per line.
pub struct ArchiveWriter<W: Write> {
    out: BufWriter<W>,
    written: usize,
}

impl ArchiveWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }
        let file =
            File::create(path).with_context(|| format!("Failed to create archive {:?}", path))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            out: BufWriter::new(inner),
            written: 0,
        }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, record).context("Failed to serialize record")?;
        self.out.write_all(b"\n").context("Failed to write archive")?;
        self.written += 1;
        Ok(())
    }

    pub fn write_matrix(&mut self, key: &str, matrix: &FeatureMatrix) -> Result<()> {
        self.write_record(&FeatureRecord::from_matrix(key, matrix))
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out.flush().context("Failed to flush archive")?;
        Ok(self.written)
    }
}

/// Read every record of a JSON-lines archive, skipping blank lines.
pub fn read_archive<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open archive {:?}", path))?;
    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {:?}", path))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{:?}:{}: malformed record", path, line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}
