//! Configuration for a dedup run.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DepictError, Result};
use crate::persistence::serialization::SnapshotFormat;

/// Default snapshot file name, created inside the scanned directory.
pub const DEFAULT_DB_FILE: &str = "depict.db";

/// Extensions considered images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Named search radii for the similarity sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tolerance {
    Exact,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl Tolerance {
    /// Hamming radius for this preset.
    pub fn radius(&self) -> u32 {
        match self {
            Tolerance::Exact => 0,
            Tolerance::Low => 4,
            Tolerance::Medium => 8,
            Tolerance::High => 16,
            Tolerance::VeryHigh => 32,
        }
    }
}

/// Perceptual hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Mean,
    Gradient,
    VertGradient,
    DoubleGradient,
    #[default]
    Blockhash,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Mean => "mean",
            HashAlgorithm::Gradient => "gradient",
            HashAlgorithm::VertGradient => "vert-gradient",
            HashAlgorithm::DoubleGradient => "double-gradient",
            HashAlgorithm::Blockhash => "blockhash",
        }
    }
}

/// Perceptual hash parameters.
///
/// Hashes are only comparable when computed with equal settings, so these
/// are recorded in the snapshot next to the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSettings {
    #[serde(rename = "Algorithm")]
    pub algorithm: HashAlgorithm,
    #[serde(rename = "Width")]
    pub width: u32,
    #[serde(rename = "Height")]
    pub height: u32,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            width: 8,
            height: 8,
        }
    }
}

impl fmt::Display for HashSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}x{}", self.algorithm.as_str(), self.width, self.height)
    }
}

/// Everything a [`Deduplicator`](crate::dedup::Deduplicator) needs.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Search radius for the similarity sweep.
    pub radius: u32,
    /// Snapshot location. Relative paths are resolved against the scanned
    /// directory.
    pub db_path: PathBuf,
    pub format: SnapshotFormat,
    /// Descend into subdirectories. Names are then relative paths.
    pub recursive: bool,
    pub hash: HashSettings,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            radius: Tolerance::default().radius(),
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            format: SnapshotFormat::default(),
            recursive: false,
            hash: HashSettings::default(),
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hash.width == 0 || self.hash.height == 0 {
            return Err(DepictError::InvalidConfig(format!(
                "hash size must be positive, got {}x{}",
                self.hash.width, self.hash.height
            )));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(DepictError::InvalidConfig(
                "snapshot path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
