//! Output layout, writing, and the run manifest.
//!
//! All generated files live under `<output_dir>/addon/`:
//!
//! ```text
//! <output_dir>/
//!   addon/<mod>/<category>.json        normalize mode
//!   addon/SDLS_MERGED/<category>.json  merge mode
//!   <conflict_log>                     merge mode, only when conflicts occurred
//!   sdls-manifest.json                 files written by the last run
//! ```
//!
//! The manifest records paths relative to `<output_dir>`. It lets the next run
//! (or `sdls clean`) remove outputs that are no longer produced.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sdls_core::Category;
use serde::{Deserialize, Serialize};

use crate::discovery::{MERGED_DIR, category_file};

/// Manifest file name under the output root.
pub const MANIFEST_FILE: &str = "sdls-manifest.json";

const MANIFEST_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// OutputLayout
// ---------------------------------------------------------------------------

/// Where each kind of output goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: output_dir.into(),
        }
    }

    /// The output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/addon`.
    #[must_use]
    pub fn addon_root(&self) -> PathBuf {
        self.root.join("addon")
    }

    /// Normalized document for one mod.
    #[must_use]
    pub fn normalized_path(&self, mod_name: &str, category: &Category) -> PathBuf {
        category_file(&self.addon_root().join(mod_name), category, ".json")
    }

    /// Directory holding merged documents.
    #[must_use]
    pub fn merged_dir(&self) -> PathBuf {
        self.addon_root().join(MERGED_DIR)
    }

    /// Merged document for one category.
    #[must_use]
    pub fn merged_path(&self, category: &Category) -> PathBuf {
        category_file(&self.merged_dir(), category, ".json")
    }

    /// Conflict log file.
    #[must_use]
    pub fn conflict_log_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// `path` relative to the root, or `path` itself when it lies outside.
    #[must_use]
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Write `contents` to `path`, creating parent directories.
///
/// # Errors
/// Returns any I/O error from creating directories or writing.
pub fn write_document(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Remove `path` and everything under it. Returns whether it existed.
///
/// # Errors
/// Returns any I/O error other than not-found.
pub fn remove_dir_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove one file. Returns whether it existed.
///
/// # Errors
/// Returns any I/O error other than not-found.
pub fn remove_file_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove now-empty directories from `dir` up to, but not including, `stop`.
fn prune_empty_dirs(mut dir: &Path, stop: &Path) {
    while dir != stop && dir.starts_with(stop) {
        if fs::remove_dir(dir).is_err() {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Files written by one run, relative to the output root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version.
    pub version: u32,
    /// Written files.
    pub files: BTreeSet<PathBuf>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: BTreeSet::new(),
        }
    }
}

/// Outcome of removing manifest entries.
#[derive(Debug, Default)]
pub struct Removal {
    /// Files that were deleted.
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted.
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl Manifest {
    /// Record a written file.
    pub fn insert(&mut self, layout: &OutputLayout, path: &Path) {
        self.files.insert(layout.relative(path));
    }

    /// Load the manifest of the previous run.
    ///
    /// A missing file is an empty manifest. A corrupt one is logged and
    /// treated as empty, so a bad manifest never blocks a run.
    ///
    /// # Errors
    /// Returns I/O errors other than not-found.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        match serde_json::from_str(&text) {
            Ok(manifest) => Ok(manifest),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable manifest: {e}");
                Ok(Self::default())
            }
        }
    }

    /// Write the manifest as pretty JSON.
    ///
    /// # Errors
    /// Returns any I/O error from writing.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        write_document(path, &text)
    }

    /// Files in `self` that `current` no longer lists.
    #[must_use]
    pub fn stale_against(&self, current: &Self) -> Vec<PathBuf> {
        self.files.difference(&current.files).cloned().collect()
    }

    /// Delete `files` (relative to the layout root) and prune directories
    /// left empty under `addon/`.
    pub fn remove_files(layout: &OutputLayout, files: &[PathBuf]) -> Removal {
        let addon_root = layout.addon_root();
        let mut removal = Removal::default();
        for relative in files {
            let path = layout.root().join(relative);
            match remove_file_if_present(&path) {
                Ok(true) => {
                    tracing::info!(path = %path.display(), "removed stale output");
                    if let Some(parent) = path.parent() {
                        prune_empty_dirs(parent, &addon_root);
                    }
                    removal.removed.push(path);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), "could not remove output: {e}");
                    removal.failed.push((path, e));
                }
            }
        }
        removal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("/out");
        let category = Category::new("entities/qualities");
        assert_eq!(
            layout.normalized_path("my-mod", &category),
            PathBuf::from("/out/addon/my-mod/entities/qualities.json")
        );
        assert_eq!(
            layout.merged_path(&category),
            PathBuf::from("/out/addon/SDLS_MERGED/entities/qualities.json")
        );
        assert_eq!(layout.manifest_path(), PathBuf::from("/out/sdls-manifest.json"));
        assert_eq!(
            layout.relative(Path::new("/out/addon/x.json")),
            PathBuf::from("addon/x.json")
        );
    }

    #[test]
    fn write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");
        write_document(&path, "[]").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "[]");
    }

    #[test]
    fn removing_absent_paths_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_dir_if_present(&dir.path().join("missing")).unwrap());
        assert!(!remove_file_if_present(&dir.path().join("missing.json")).unwrap());
    }

    #[test]
    fn manifest_round_trip_and_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let mut old = Manifest::default();
        old.insert(&layout, &dir.path().join("addon/a/x.json"));
        old.insert(&layout, &dir.path().join("addon/b/x.json"));
        old.save(&layout.manifest_path()).unwrap();

        let loaded = Manifest::load(&layout.manifest_path()).unwrap();
        assert_eq!(loaded, old);

        let mut current = Manifest::default();
        current.insert(&layout, &dir.path().join("addon/a/x.json"));
        assert_eq!(loaded.stale_against(&current), [PathBuf::from("addon/b/x.json")]);
    }

    #[test]
    fn corrupt_manifest_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), Manifest::default());
    }

    #[test]
    fn remove_files_prunes_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let stale = dir.path().join("addon/gone/entities/qualities.json");
        let kept = dir.path().join("addon/kept/entities/qualities.json");
        write_document(&stale, "[]").unwrap();
        write_document(&kept, "[]").unwrap();

        let removal = Manifest::remove_files(
            &layout,
            &[
                PathBuf::from("addon/gone/entities/qualities.json"),
                PathBuf::from("addon/never-existed.json"),
            ],
        );
        assert_eq!(removal.removed, [stale]);
        assert!(removal.failed.is_empty());
        assert!(!dir.path().join("addon/gone").exists());
        assert!(kept.exists());
        assert!(layout.addon_root().exists());
    }
}
