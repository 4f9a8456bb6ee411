//! # depict
//!
//! Near-duplicate image detection on top of a BK-tree.
//!
//! This library provides:
//! - A generic, thread-safe BK-tree over any [`Metric`] item
//! - Perceptual image hashes compared by Hamming distance
//! - Snapshot persistence (JSON or bincode)
//! - A driver that indexes a directory and reports similar images
//!
//! ## Example
//!
//! ```rust
//! use depict::{BkTree, Metric};
//!
//! #[derive(Clone)]
//! struct Word(String);
//!
//! impl Metric for Word {
//!     fn distance(&self, other: &Self) -> u32 {
//!         self.0.len().abs_diff(other.0.len()) as u32
//!     }
//!
//!     fn name(&self) -> &str {
//!         &self.0
//!     }
//! }
//!
//! let tree = BkTree::new();
//! tree.add(Word("cat".into()));
//! tree.add(Word("horse".into()));
//!
//! let near = tree.search(&Word("dog".into()), 1);
//! assert_eq!(near.len(), 1);
//! assert_eq!(near[0].0, "cat");
//! ```

pub mod bktree;
pub mod config;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod metric;
pub mod persistence;
pub mod scanner;

pub use bktree::BkTree;
pub use config::{DedupConfig, HashAlgorithm, HashSettings, Tolerance};
pub use dedup::{DedupReport, Deduplicator};
pub use error::{DepictError, Result};
pub use hash::{ImageInfo, PerceptualHash};
pub use metric::Metric;
pub use persistence::{SnapshotFormat, SnapshotStore};
