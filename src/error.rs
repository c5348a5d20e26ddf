//! Run-level error type for sdls.
//!
//! [`SdlsError`] covers the failures that stop a run. Problems confined to a
//! single entry or file are not errors at this level: they are logged and
//! collected in the [`crate::pipeline::RunReport`] instead.
//!
//! Messages say what went wrong and how to fix it.

use std::fmt;
use std::path::PathBuf;

use sdls_core::RegistryError;

// ---------------------------------------------------------------------------
// SdlsError
// ---------------------------------------------------------------------------

/// Unified error type for sdls runs.
#[derive(Debug)]
pub enum SdlsError {
    /// The configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// The mold registry could not be built.
    Registry {
        /// Directory the molds were read from.
        molds_dir: PathBuf,
        /// Underlying registry failure.
        source: RegistryError,
    },

    /// The mod directory does not exist.
    AddonDirMissing {
        /// The configured addon directory.
        path: PathBuf,
    },

    /// A file the run cannot continue without could not be read.
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An output file could not be written.
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The background processing thread died before reporting.
    WorkerLost,
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for SdlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {detail}\n  To fix: edit the config file and correct the issue, or print the effective config:\n    sdls config",
                    path.display()
                )
            }
            Self::Registry { molds_dir, source } => {
                write!(
                    f,
                    "could not load molds from '{}': {source}\n  To fix: point paths.molds_dir at a directory containing default/ and defaultComponents/.",
                    molds_dir.display()
                )
            }
            Self::AddonDirMissing { path } => {
                write!(
                    f,
                    "addon directory '{}' does not exist.\n  To fix: create it, or set paths.addon_dir in sdls.toml.",
                    path.display()
                )
            }
            Self::Read { path, source } => {
                write!(
                    f,
                    "could not read '{}': {source}\n  To fix: check that the file exists and is readable.",
                    path.display()
                )
            }
            Self::Write { path, source } => {
                write!(
                    f,
                    "could not write '{}': {source}\n  To fix: check permissions and disk space under paths.output_dir.",
                    path.display()
                )
            }
            Self::WorkerLost => {
                write!(
                    f,
                    "processing stopped before all categories were handled.\n  To fix: rerun with SDLS_LOG=debug to see where it stopped."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for SdlsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry { source, .. } => Some(source),
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<crate::config::ConfigError> for SdlsError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn display_config_error() {
        let err = SdlsError::Config {
            path: PathBuf::from("/game/sdls.toml"),
            detail: "line 2: unknown field `mergeMode`".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/game/sdls.toml"));
        assert!(msg.contains("unknown field"));
        assert!(msg.contains("To fix:"));
    }

    #[test]
    fn display_registry_error_names_dir() {
        let err = SdlsError::Registry {
            molds_dir: PathBuf::from("/game/molds"),
            source: RegistryError::EmptyResourceSet {
                location: "/game/molds".to_owned(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("could not load molds from '/game/molds'"));
        assert!(msg.contains("defaultComponents/"));
        assert!(err.source().is_some());
    }

    #[test]
    fn display_addon_dir_missing() {
        let err = SdlsError::AddonDirMissing {
            path: PathBuf::from("/game/addon"),
        };
        assert!(err.to_string().contains("paths.addon_dir"));
        assert!(err.source().is_none());
    }

    #[test]
    fn write_error_keeps_source() {
        let err = SdlsError::Write {
            path: PathBuf::from("out.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("out.json"));
        assert!(err.source().is_some());
    }

    #[test]
    fn from_config_error() {
        let err: SdlsError = ConfigError {
            path: Some(PathBuf::from("sdls.toml")),
            message: "bad".to_owned(),
        }
        .into();
        match err {
            SdlsError::Config { path, detail } => {
                assert_eq!(path, PathBuf::from("sdls.toml"));
                assert_eq!(detail, "bad");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
