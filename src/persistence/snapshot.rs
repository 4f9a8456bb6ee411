//! Snapshot: save/load a whole tree to/from a single file.

use crate::bktree::BkTree;
use crate::config::HashSettings;
use crate::error::{DepictError, Result};
use crate::persistence::serialization::{SnapshotFormat, TreeSnapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and saves trees at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotStore {
    /// A JSON snapshot store at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_format(path, SnapshotFormat::Json)
    }

    pub fn with_format(path: impl AsRef<Path>, format: SnapshotFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the tree, or an empty tree when no snapshot exists yet.
    ///
    /// A snapshot that exists but cannot be read or decoded is an error;
    /// nothing is partially loaded.
    pub fn load<T: DeserializeOwned>(&self) -> Result<BkTree<T>> {
        self.load_with_hasher().map(|(tree, _)| tree)
    }

    /// Like [`load`](Self::load), also returning the hash settings recorded
    /// with the snapshot, if any.
    pub fn load_with_hasher<T: DeserializeOwned>(
        &self,
    ) -> Result<(BkTree<T>, Option<HashSettings>)> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot, starting empty");
                return Ok((BkTree::new(), None));
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: TreeSnapshot<T> = self
            .format
            .decode_tree(&data)
            .map_err(|e| self.load_error(e))?;
        let hasher = snapshot.hasher.clone();
        let tree = BkTree::from_snapshot(snapshot).map_err(|e| self.load_error(e))?;
        debug!(path = %self.path.display(), items = tree.len(), "loaded snapshot");
        Ok((tree, hasher))
    }

    fn load_error(&self, err: DepictError) -> DepictError {
        DepictError::Snapshot {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }

    /// Write the tree, replacing any previous snapshot.
    pub fn save<T: Serialize + Clone>(&self, tree: &BkTree<T>) -> Result<()> {
        self.save_with_hasher(tree, None)
    }

    /// Write the tree together with the settings its hashes were made with.
    ///
    /// The data goes to a sibling temp file first and is renamed into
    /// place, so readers never observe a truncated snapshot.
    pub fn save_with_hasher<T: Serialize + Clone>(
        &self,
        tree: &BkTree<T>,
        hasher: Option<&HashSettings>,
    ) -> Result<()> {
        let mut snapshot = tree.to_snapshot();
        snapshot.hasher = hasher.cloned();
        let data = self.format.encode(&snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, &data)?;
        fs::rename(&temp, &self.path)?;
        debug!(
            path = %self.path.display(),
            items = snapshot.nodes.len(),
            bytes = data.len(),
            "saved snapshot"
        );
        Ok(())
    }
}
