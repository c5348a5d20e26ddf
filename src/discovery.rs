//! Finding mod input documents.
//!
//! Each sub-directory of the addon directory is a mod. A mod supplies a
//! category by shipping `<category>.sdls`, or `<category>SDLS.json`:
//!
//! ```text
//! addon/
//!   zubmariner-plus/
//!     entities/qualities.sdls
//!     constants/combatconstantsSDLS.json
//!   SDLS_MERGED/            (our own output, never an input)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use sdls_core::Category;

/// Directory name that merge mode writes to.
pub const MERGED_DIR: &str = "SDLS_MERGED";

/// Preferred input extension.
pub const SDLS_EXT: &str = "sdls";

/// Suffix of the alternative input name, appended to the category name.
pub const SDLS_JSON_SUFFIX: &str = "SDLS.json";

/// One input document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// Mod directory name, used as the source label.
    pub mod_name: String,
    /// Category the document belongs to.
    pub category: Category,
    /// File to read.
    pub path: PathBuf,
}

/// `root/<category path><suffix>`, e.g. `root/entities/qualities.sdls`.
#[must_use]
pub fn category_file(root: &Path, category: &Category, suffix: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    let mut segments = category.path().split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            path.push(segment);
        } else {
            path.push(format!("{segment}{suffix}"));
        }
    }
    path
}

/// Mod directory names under `addon_dir`, sorted.
///
/// Skips plain files, the merged output directory, names that are not UTF-8,
/// and names matching any of `ignore`.
///
/// # Errors
/// Returns the I/O error if `addon_dir` cannot be listed.
pub fn list_mods(addon_dir: &Path, ignore: &[Pattern]) -> io::Result<Vec<String>> {
    let mut mods = Vec::new();
    for entry in fs::read_dir(addon_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(path = %entry.path().display(), "skipping mod directory with non UTF-8 name");
            continue;
        };
        if name == MERGED_DIR {
            continue;
        }
        if ignore.iter().any(|p| p.matches(&name)) {
            tracing::debug!(mod_name = %name, "mod ignored by pattern");
            continue;
        }
        mods.push(name);
    }
    mods.sort();
    Ok(mods)
}

/// The input file a mod provides for `category`, if any.
///
/// `.sdls` wins over `SDLS.json`; having both logs a warning.
#[must_use]
pub fn locate(mod_dir: &Path, category: &Category) -> Option<PathBuf> {
    let sdls = category_file(mod_dir, category, &format!(".{SDLS_EXT}"));
    let json = category_file(mod_dir, category, SDLS_JSON_SUFFIX);
    match (sdls.is_file(), json.is_file()) {
        (true, true) => {
            tracing::warn!(
                kept = %sdls.display(),
                ignored = %json.display(),
                "found both a .sdls and a SDLS.json file; using the .sdls file. Consider removing one of them"
            );
            Some(sdls)
        }
        (true, false) => Some(sdls),
        (false, true) => Some(json),
        (false, false) => None,
    }
}

/// Every input document, mod by mod, in category order within a mod.
///
/// # Errors
/// Returns the I/O error if `addon_dir` cannot be listed.
pub fn discover(
    addon_dir: &Path,
    categories: &[Category],
    ignore: &[Pattern],
) -> io::Result<Vec<SourceFile>> {
    let mut sources = Vec::new();
    for mod_name in list_mods(addon_dir, ignore)? {
        let mod_dir = addon_dir.join(&mod_name);
        for category in categories {
            if let Some(path) = locate(&mod_dir, category) {
                sources.push(SourceFile {
                    mod_name: mod_name.clone(),
                    category: category.clone(),
                    path,
                });
            }
        }
    }
    tracing::debug!(count = sources.len(), "input documents discovered");
    Ok(sources)
}
