//! Run configuration (`sdls.toml`).
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration. Relative paths are resolved against the directory that
//! holds the config file (see [`SdlsConfig::anchored`]).

use std::fmt;
use std::path::{Path, PathBuf};

use glob::Pattern;
use sdls_core::Category;
use serde::{Deserialize, Serialize};

/// Default file name looked up by the CLI.
pub const CONFIG_FILE: &str = "sdls.toml";

/// Categories processed when the config does not list any.
pub const DEFAULT_CATEGORIES: [&str; 15] = [
    "entities/qualities",
    "entities/areas",
    "entities/events",
    "entities/exchanges",
    "entities/personas",
    "geography/TileRules",
    "geography/Tiles",
    "geography/TileSets",
    "encyclopaedia/CombatAttacks",
    "encyclopaedia/CombatItems",
    "encyclopaedia/SpawnedEntities",
    "encyclopaedia/Associations",
    "encyclopaedia/Tutorials",
    "encyclopaedia/Flavours",
    "constants/combatconstants",
];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level sdls configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdlsConfig {
    /// Input, output and mold locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Merge mode settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Run behaviour.
    #[serde(default)]
    pub run: RunConfig,

    /// Category paths to process, e.g. `"entities/qualities"`.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for SdlsConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            merge: MergeConfig::default(),
            run: RunConfig::default(),
            categories: default_categories(),
        }
    }
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|&c| c.to_owned()).collect()
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

/// Filesystem locations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory holding one sub-directory per mod (default: `"addon"`).
    #[serde(default = "default_addon_dir")]
    pub addon_dir: PathBuf,

    /// Root that generated files are written under (default: `"."`).
    ///
    /// Outputs land in `<output_dir>/addon/...`, so pointing this at the
    /// parent of `addon_dir` places them next to the mods they came from.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory with `default/` and `defaultComponents/` mold files
    /// (default: `"molds"`).
    #[serde(default = "default_molds_dir")]
    pub molds_dir: PathBuf,

    /// Shipped base data, laid out like a mod (`<category>.json`). Only read
    /// when `merge.with_base_data` is set.
    #[serde(default)]
    pub base_data_dir: Option<PathBuf>,

    /// Glob patterns of mod directory names to skip (e.g. `"*.disabled"`).
    #[serde(default)]
    pub ignore_mods: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            addon_dir: default_addon_dir(),
            output_dir: default_output_dir(),
            molds_dir: default_molds_dir(),
            base_data_dir: None,
            ignore_mods: Vec::new(),
        }
    }
}

fn default_addon_dir() -> PathBuf {
    PathBuf::from("addon")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_molds_dir() -> PathBuf {
    PathBuf::from("molds")
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Merge mode settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Fold every mod into one merged document per category.
    #[serde(default)]
    pub enabled: bool,

    /// Write field-level merge conflicts to `conflict_log`.
    #[serde(default = "default_true")]
    pub log_conflicts: bool,

    /// Conflict log file name, relative to `output_dir`.
    #[serde(default = "default_conflict_log")]
    pub conflict_log: String,

    /// Seed the merge with `paths.base_data_dir` so changes to shipped data
    /// are compared against it instead of the mold defaults.
    #[serde(default)]
    pub with_base_data: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_conflicts: default_true(),
            conflict_log: default_conflict_log(),
            with_base_data: false,
        }
    }
}

fn default_conflict_log() -> String {
    "SDLS_MERGE_CONFLICTS.log".to_owned()
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Run behaviour.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// After processing, delete files a previous run generated that this run
    /// did not regenerate.
    #[serde(default)]
    pub cleanup_on_exit: bool,

    /// Log per-category and per-stage timings.
    #[serde(default)]
    pub debug_timing: bool,

    /// Process on a worker thread and report progress while waiting.
    #[serde(default)]
    pub fast_load: bool,
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

impl SdlsConfig {
    /// Configured categories, normalized.
    #[must_use]
    pub fn category_list(&self) -> Vec<Category> {
        self.categories.iter().map(Category::new).collect()
    }

    /// Compiled `paths.ignore_mods` patterns.
    ///
    /// Patterns are validated by [`SdlsConfig::parse`], so a config obtained
    /// from there never fails here; invalid patterns in a hand-built config
    /// are skipped with a warning.
    #[must_use]
    pub fn ignore_patterns(&self) -> Vec<Pattern> {
        self.paths
            .ignore_mods
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %raw, "ignoring invalid mod pattern: {e}");
                    None
                }
            })
            .collect()
    }

    /// Resolve relative paths against `root`.
    #[must_use]
    pub fn anchored(mut self, root: &Path) -> Self {
        let root = if root.as_os_str().is_empty() {
            Path::new(".")
        } else {
            root
        };
        let anchor = |p: &mut PathBuf| {
            if p.as_path() == Path::new(".") {
                *p = root.to_path_buf();
            } else if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        anchor(&mut self.paths.addon_dir);
        anchor(&mut self.paths.output_dir);
        anchor(&mut self.paths.molds_dir);
        if let Some(base) = self.paths.base_data_dir.as_mut() {
            anchor(base);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading an sdls configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl SdlsConfig {
    /// Load configuration from a TOML file and anchor its paths to the file's
    /// directory.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields or bad
    ///   patterns, returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default().anchored(root));
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents)
            .map(|cfg| cfg.anchored(root))
            .map_err(|mut e| {
                e.path = Some(path.to_owned());
                e
            })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or an invalid
    /// `paths.ignore_mods` pattern.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;

        for raw in &config.paths.ignore_mods {
            Pattern::new(raw).map_err(|e| ConfigError {
                path: None,
                message: format!("invalid pattern in paths.ignore_mods `{raw}`: {e}"),
            })?;
        }
        if config.merge.conflict_log.trim().is_empty() {
            return Err(ConfigError {
                path: None,
                message: "merge.conflict_log must not be empty".to_owned(),
            });
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = SdlsConfig::default();
        assert_eq!(cfg.paths.addon_dir, PathBuf::from("addon"));
        assert_eq!(cfg.paths.output_dir, PathBuf::from("."));
        assert_eq!(cfg.paths.molds_dir, PathBuf::from("molds"));
        assert_eq!(cfg.paths.base_data_dir, None);
        assert!(!cfg.merge.enabled);
        assert!(cfg.merge.log_conflicts);
        assert_eq!(cfg.merge.conflict_log, "SDLS_MERGE_CONFLICTS.log");
        assert!(!cfg.merge.with_base_data);
        assert_eq!(cfg.run, RunConfig::default());
        assert_eq!(cfg.categories.len(), 15);
    }

    #[test]
    fn parse_empty_string() {
        assert_eq!(SdlsConfig::parse("").unwrap(), SdlsConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
categories = ["entities/qualities", "constants/combatconstants"]

[paths]
addon_dir = "mods"
output_dir = "out"
molds_dir = "data/molds"
base_data_dir = "data/base"
ignore_mods = ["*.disabled"]

[merge]
enabled = true
log_conflicts = false
conflict_log = "conflicts.txt"
with_base_data = true

[run]
cleanup_on_exit = true
debug_timing = true
fast_load = true
"#;
        let cfg = SdlsConfig::parse(toml).unwrap();
        assert_eq!(cfg.paths.addon_dir, PathBuf::from("mods"));
        assert_eq!(cfg.paths.base_data_dir, Some(PathBuf::from("data/base")));
        assert_eq!(cfg.paths.ignore_mods, ["*.disabled"]);
        assert!(cfg.merge.enabled);
        assert!(!cfg.merge.log_conflicts);
        assert_eq!(cfg.merge.conflict_log, "conflicts.txt");
        assert!(cfg.run.cleanup_on_exit && cfg.run.debug_timing && cfg.run.fast_load);
        assert_eq!(
            cfg.category_list(),
            [Category::new("entities/qualities"), Category::new("constants/combatconstants")]
        );
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let cfg = SdlsConfig::parse("[merge]\nenabled = true\n").unwrap();
        assert!(cfg.merge.enabled);
        assert!(cfg.merge.log_conflicts);
        assert_eq!(cfg.paths, PathsConfig::default());
    }

    #[test]
    fn parse_rejects_unknown_top_level_field() {
        let err = SdlsConfig::parse("mergeMode = true\n").unwrap_err();
        assert!(err.message.contains("unknown field"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_unknown_nested_field() {
        let err = SdlsConfig::parse("[merge]\nlogMergeConflicts = true\n").unwrap_err();
        assert!(err.message.contains("unknown field"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_bad_ignore_pattern() {
        let err = SdlsConfig::parse("[paths]\nignore_mods = [\"[unclosed\"]\n").unwrap_err();
        assert!(err.message.contains("ignore_mods"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_empty_conflict_log() {
        let err = SdlsConfig::parse("[merge]\nconflict_log = \" \"\n").unwrap_err();
        assert!(err.message.contains("conflict_log"), "{}", err.message);
    }

    #[test]
    fn parse_includes_line_number_on_error() {
        let toml = "categories = []\n[merge]\nenabled = \"yes\"\n";
        let err = SdlsConfig::parse(toml).unwrap_err();
        assert!(err.message.contains("line 3"), "{}", err.message);
    }

    #[test]
    fn load_missing_file_returns_anchored_defaults() {
        let cfg = SdlsConfig::load(Path::new("/nonexistent/sdls.toml")).unwrap();
        assert_eq!(cfg.paths.addon_dir, PathBuf::from("/nonexistent/addon"));
        assert_eq!(cfg.merge, MergeConfig::default());
    }

    #[test]
    fn load_anchors_relative_paths_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let text = "[paths]\naddon_dir = \"mods\"\nmolds_dir = \"/abs/molds\"\n";
        std::fs::write(&path, text).unwrap();
        let cfg = SdlsConfig::load(&path).unwrap();
        assert_eq!(cfg.paths.addon_dir, dir.path().join("mods"));
        assert_eq!(cfg.paths.molds_dir, PathBuf::from("/abs/molds"));
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = SdlsConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    #[test]
    fn ignore_patterns_match_mod_names() {
        let cfg =
            SdlsConfig::parse("[paths]\nignore_mods = [\"*.disabled\", \"wip-*\"]\n").unwrap();
        let patterns = cfg.ignore_patterns();
        assert!(patterns.iter().any(|p| p.matches("old.disabled")));
        assert!(patterns.iter().any(|p| p.matches("wip-zubmariner")));
        assert!(!patterns.iter().any(|p| p.matches("sunless-expanded")));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = SdlsConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SdlsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn config_error_display_without_path() {
        let err = ConfigError {
            path: None,
            message: "bad field".to_owned(),
        };
        assert_eq!(err.to_string(), "config error: bad field");
    }
}
