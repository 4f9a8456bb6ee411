//! Perceptual hashes and the image items indexed by depict.

use std::fmt;
use std::path::Path;

use image::ImageReader;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{HashAlgorithm, HashSettings};
use crate::error::{DepictError, Result};
use crate::metric::{self, Metric};

/// A perceptual image hash compared by Hamming distance.
///
/// Serialized as the base64 string produced by `image_hasher`.
#[derive(Clone, PartialEq, Eq)]
pub struct PerceptualHash(ImageHash);

impl PerceptualHash {
    /// Build a hash from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ImageHash::from_bytes(bytes)
            .map(Self)
            .map_err(|e| DepictError::InvalidHash(format!("{:?}", e)))
    }

    /// Parse the base64 form written by [`to_base64`](Self::to_base64).
    pub fn from_base64(encoded: &str) -> Result<Self> {
        ImageHash::from_base64(encoded)
            .map(Self)
            .map_err(|e| DepictError::InvalidHash(format!("{:?}", e)))
    }

    pub fn to_base64(&self) -> String {
        self.0.to_base64()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Number of differing bits.
    pub fn hamming_distance(&self, other: &PerceptualHash) -> u32 {
        metric::hamming(self.as_bytes(), other.as_bytes())
    }
}

impl fmt::Debug for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PerceptualHash({})", self.to_base64())
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for PerceptualHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PerceptualHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PerceptualHash::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// An indexed image: its perceptual hash and its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(rename = "h")]
    pub hash: PerceptualHash,
    #[serde(rename = "n")]
    pub name: String,
}

impl ImageInfo {
    pub fn new(name: impl Into<String>, hash: PerceptualHash) -> Self {
        Self {
            hash,
            name: name.into(),
        }
    }
}

impl Metric for ImageInfo {
    fn distance(&self, other: &Self) -> u32 {
        self.hash.hamming_distance(&other.hash)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.name, self.hash)
    }
}

/// Computes perceptual hashes of image files.
pub struct Fingerprinter {
    hasher: Hasher,
}

impl Fingerprinter {
    pub fn new(settings: &HashSettings) -> Self {
        let hasher = HasherConfig::new()
            .hash_alg(settings.algorithm.into())
            .hash_size(settings.width, settings.height)
            .to_hasher();
        Self { hasher }
    }

    /// Decode the image at `path` and hash it.
    pub fn fingerprint(&self, path: &Path) -> Result<PerceptualHash> {
        let img = ImageReader::open(path)
            .map_err(|e| image_error(path, e))?
            .with_guessed_format()
            .map_err(|e| image_error(path, e))?
            .decode()
            .map_err(|e| image_error(path, e))?;
        Ok(PerceptualHash(self.hasher.hash_image(&img)))
    }

    /// Hash an already decoded image.
    pub fn hash_image(&self, img: &image::DynamicImage) -> PerceptualHash {
        PerceptualHash(self.hasher.hash_image(img))
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(&HashSettings::default())
    }
}

fn image_error(path: &Path, err: impl fmt::Display) -> DepictError {
    DepictError::Image {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

impl From<HashAlgorithm> for HashAlg {
    fn from(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Mean => HashAlg::Mean,
            HashAlgorithm::Gradient => HashAlg::Gradient,
            HashAlgorithm::VertGradient => HashAlg::VertGradient,
            HashAlgorithm::DoubleGradient => HashAlg::DoubleGradient,
            HashAlgorithm::Blockhash => HashAlg::Blockhash,
        }
    }
}
