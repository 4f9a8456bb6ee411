//! Dedup driver: index a directory of images and report near-duplicates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::bktree::BkTree;
use crate::config::DedupConfig;
use crate::error::{DepictError, Result};
use crate::hash::{Fingerprinter, ImageInfo};
use crate::persistence::SnapshotStore;
use crate::scanner::{self, Candidate};

/// An image that could not be fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedImage {
    pub name: String,
    pub reason: String,
}

/// Counters from one population pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateStats {
    /// Image files found in the directory.
    pub scanned: usize,
    /// Newly hashed and inserted.
    pub added: usize,
    /// Already present in the tree.
    pub skipped: usize,
    pub failed: Vec<FailedImage>,
}

/// Outcome of a full [`Deduplicator::run`].
#[derive(Debug, Clone)]
pub struct DedupReport {
    pub stats: PopulateStats,
    /// Items in the tree after population.
    pub indexed: usize,
    pub radius: u32,
    /// Image name to the names found similar to it.
    pub similars: BTreeMap<String, Vec<String>>,
}

enum Outcome {
    Added,
    Skipped,
    Failed(FailedImage),
}

/// Indexes the images of one directory into a persisted BK-tree.
pub struct Deduplicator {
    dir: PathBuf,
    config: DedupConfig,
    fingerprinter: Fingerprinter,
    store: SnapshotStore,
}

impl Deduplicator {
    pub fn new(dir: impl AsRef<Path>, config: DedupConfig) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        let db_path = dir.join(&config.db_path);
        let store = SnapshotStore::with_format(db_path, config.format);
        let fingerprinter = Fingerprinter::new(&config.hash);
        Ok(Self {
            dir,
            config,
            fingerprinter,
            store,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Load the persisted tree, empty if none exists yet.
    ///
    /// Fails with [`DepictError::InvalidConfig`] when the snapshot was built
    /// with other hash settings: its hashes are not comparable with new ones.
    pub fn load_tree(&self) -> Result<BkTree<ImageInfo>> {
        let (tree, hasher) = self.store.load_with_hasher()?;
        match hasher {
            Some(stored) if stored != self.config.hash => Err(DepictError::InvalidConfig(format!(
                "{} holds {} hashes but {} was requested",
                self.store.path().display(),
                stored,
                self.config.hash
            ))),
            None if !tree.is_empty() => {
                warn!(
                    "{} does not record its hash settings, assuming {}",
                    self.store.path().display(),
                    self.config.hash
                );
                Ok(tree)
            }
            _ => Ok(tree),
        }
    }

    /// Hash every image not yet in `tree` and insert it.
    ///
    /// Images are hashed in parallel outside the tree lock. Already indexed
    /// names are skipped without reading the file, which makes re-runs over
    /// an unchanged directory cheap and idempotent.
    pub fn populate(&self, tree: &BkTree<ImageInfo>) -> Result<PopulateStats> {
        let candidates = scanner::scan_directory(&self.dir, self.config.recursive)?;
        info!(
            "Found {} image(s) in {}",
            candidates.len(),
            self.dir.display()
        );

        let outcomes: Vec<Outcome> = timed("hashing images", || {
            candidates
                .par_iter()
                .map(|candidate| self.index_one(tree, candidate))
                .collect()
        });

        let mut stats = PopulateStats {
            scanned: candidates.len(),
            ..PopulateStats::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Added => stats.added += 1,
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Failed(failed) => stats.failed.push(failed),
            }
        }
        Ok(stats)
    }

    fn index_one(&self, tree: &BkTree<ImageInfo>, candidate: &Candidate) -> Outcome {
        if tree.search_by_name(&candidate.name).is_some() {
            debug!(name = %candidate.name, "already indexed");
            return Outcome::Skipped;
        }

        match self.fingerprinter.fingerprint(&candidate.path) {
            Ok(hash) => {
                if tree.insert_if_absent(ImageInfo::new(candidate.name.clone(), hash)) {
                    Outcome::Added
                } else {
                    Outcome::Skipped
                }
            }
            Err(e) => {
                warn!("{}", e);
                Outcome::Failed(FailedImage {
                    name: candidate.name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Run the all-pairs similarity sweep with the configured radius.
    pub fn similars(&self, tree: &BkTree<ImageInfo>) -> BTreeMap<String, Vec<String>> {
        timed("similarity sweep", || tree.search_similars(self.config.radius))
    }

    /// Hash an arbitrary image and list indexed images within the configured
    /// radius, closest first.
    pub fn lookup(&self, tree: &BkTree<ImageInfo>, path: &Path) -> Result<Vec<(ImageInfo, u32)>> {
        let hash = self.fingerprinter.fingerprint(path)?;
        let query = ImageInfo::new(self.name_for(path), hash);
        let mut found = tree.search_with_distance(&query, self.config.radius);
        found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.name.cmp(&b.0.name)));
        Ok(found)
    }

    /// Name `path` would be indexed under: relative to the scanned directory
    /// when it lies inside it, so an indexed file never matches itself.
    fn name_for(&self, path: &Path) -> String {
        let dir = fs::canonicalize(&self.dir).unwrap_or_else(|_| self.dir.clone());
        let file = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        match file.strip_prefix(&dir) {
            Ok(relative) => relative.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    /// Load, populate, save, then sweep.
    pub fn run(&self) -> Result<DedupReport> {
        let tree = self.load_tree()?;
        info!(
            "Loaded {} indexed image(s) from {}",
            tree.len(),
            self.store.path().display()
        );

        let stats = self.populate(&tree)?;
        info!(
            "Indexed {} new image(s), {} already known, {} failed",
            stats.added,
            stats.skipped,
            stats.failed.len()
        );

        self.store.save_with_hasher(&tree, Some(&self.config.hash))?;

        let similars = self.similars(&tree);
        Ok(DedupReport {
            stats,
            indexed: tree.len(),
            radius: self.config.radius,
            similars,
        })
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    debug!("{} took {:.2?}", label, start.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HashAlgorithm, HashSettings, Tolerance};
    use image::{DynamicImage, GrayImage, Luma};
    use tempfile::TempDir;

    fn stripes(vertical: bool) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(64, 64, |x, y| {
            let v = if vertical { x } else { y };
            if (v / 16) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }

    fn exact_config() -> DedupConfig {
        DedupConfig {
            radius: Tolerance::Exact.radius(),
            hash: HashSettings {
                algorithm: HashAlgorithm::Mean,
                ..HashSettings::default()
            },
            ..DedupConfig::default()
        }
    }

    #[test]
    fn test_populate_counts() {
        let dir = TempDir::new().unwrap();
        stripes(true).save(dir.path().join("a.png")).unwrap();
        stripes(false).save(dir.path().join("b.png")).unwrap();
        std::fs::write(dir.path().join("c.jpg"), b"garbage").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"hello").unwrap();

        let dedup = Deduplicator::new(dir.path(), exact_config()).unwrap();
        let tree = BkTree::new();
        let stats = dedup.populate(&tree).unwrap();

        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.failed.len(), 1);
        assert_eq!(stats.failed[0].name, "c.jpg");
        assert_eq!(tree.len(), 2);

        let again = dedup.populate(&tree).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_lookup_finds_copy() {
        let dir = TempDir::new().unwrap();
        stripes(true).save(dir.path().join("a.png")).unwrap();
        stripes(false).save(dir.path().join("b.png")).unwrap();

        let outside = TempDir::new().unwrap();
        let query = outside.path().join("query.png");
        stripes(true).save(&query).unwrap();

        let dedup = Deduplicator::new(dir.path(), exact_config()).unwrap();
        let tree = BkTree::new();
        dedup.populate(&tree).unwrap();

        let found = dedup.lookup(&tree, &query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.name, "a.png");
        assert_eq!(found[0].1, 0);
    }

    #[test]
    fn test_lookup_of_indexed_file_excludes_itself() {
        let dir = TempDir::new().unwrap();
        stripes(true).save(dir.path().join("a.png")).unwrap();
        stripes(true).save(dir.path().join("copy.png")).unwrap();
        stripes(false).save(dir.path().join("b.png")).unwrap();

        let dedup = Deduplicator::new(dir.path(), exact_config()).unwrap();
        let tree = BkTree::new();
        dedup.populate(&tree).unwrap();

        let found = dedup.lookup(&tree, &dir.path().join("a.png")).unwrap();
        let names: Vec<&str> = found.iter().map(|(info, _)| info.name.as_str()).collect();
        assert_eq!(names, vec!["copy.png"]);
    }

    #[test]
    fn test_run_records_hash_settings() {
        let dir = TempDir::new().unwrap();
        stripes(true).save(dir.path().join("a.png")).unwrap();

        let dedup = Deduplicator::new(dir.path(), exact_config()).unwrap();
        dedup.run().unwrap();

        let (_, hasher) = dedup.store().load_with_hasher::<ImageInfo>().unwrap();
        assert_eq!(hasher, Some(exact_config().hash));
    }

    #[test]
    fn test_mismatched_hash_settings_rejected() {
        let dir = TempDir::new().unwrap();
        stripes(true).save(dir.path().join("a.png")).unwrap();
        Deduplicator::new(dir.path(), exact_config())
            .unwrap()
            .run()
            .unwrap();
        let db = dir.path().join("depict.db");
        let before = fs::read(&db).unwrap();

        let mut other_alg = exact_config();
        other_alg.hash.algorithm = HashAlgorithm::Blockhash;
        let mut other_size = exact_config();
        other_size.hash.width = 16;
        other_size.hash.height = 16;

        for config in [other_alg, other_size] {
            let dedup = Deduplicator::new(dir.path(), config).unwrap();
            assert!(matches!(dedup.run(), Err(DepictError::InvalidConfig(_))));
            assert!(matches!(dedup.load_tree(), Err(DepictError::InvalidConfig(_))));
        }
        assert_eq!(fs::read(&db).unwrap(), before);
    }

    #[test]
    fn test_snapshot_without_settings_is_adopted() {
        let dir = TempDir::new().unwrap();
        stripes(true).save(dir.path().join("a.png")).unwrap();

        let dedup = Deduplicator::new(dir.path(), exact_config()).unwrap();
        let tree = dedup.load_tree().unwrap();
        dedup.populate(&tree).unwrap();
        dedup.store().save(&tree).unwrap();

        let report = dedup.run().unwrap();
        assert_eq!(report.indexed, 1);
        let (_, hasher) = dedup.store().load_with_hasher::<ImageInfo>().unwrap();
        assert_eq!(hasher, Some(exact_config().hash));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = DedupConfig::default();
        config.hash.height = 0;
        assert!(Deduplicator::new(dir.path(), config).is_err());
    }
}
