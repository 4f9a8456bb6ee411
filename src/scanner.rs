//! Candidate enumeration: image files inside a directory.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::config::IMAGE_EXTENSIONS;
use crate::error::Result;

/// An image file found by [`scan_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Identity inside the tree: the path relative to the scanned directory.
    pub name: String,
    pub path: PathBuf,
}

/// Whether `path` has one of the accepted image extensions.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List the image files under `dir`, sorted by name.
///
/// Only the top level is read unless `recursive` is set. Entries that
/// cannot be read are logged and skipped; a `dir` that is missing or not a
/// directory is an error.
pub fn scan_directory(dir: &Path, recursive: bool) -> Result<Vec<Candidate>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )
        .into());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut candidates = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !has_image_extension(path) {
            continue;
        }

        let relative = path.strip_prefix(dir).unwrap_or(path);
        candidates.push(Candidate {
            name: relative.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
        });
    }

    Ok(candidates)
}
