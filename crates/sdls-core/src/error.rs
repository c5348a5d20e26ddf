//! Error types for the sdls engine.
//!
//! Errors are split by blast radius:
//!
//! - [`ParseError`]: one piece of JSON text could not be turned into a tree.
//! - [`EntryError`]: one entry of one document was rejected. Callers log it
//!   and keep going with the rest of the batch.
//! - [`RegistryError`]: a mold resource could not be loaded. Only
//!   [`RegistryError::EmptyResourceSet`] is fatal to a run; every other variant
//!   degrades to an empty, pass-through mold.

use std::io;

use thiserror::Error;

use crate::registry::MoldNamespace;

/// Malformed JSON text.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is not valid JSON.
    #[error("malformed JSON at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line of the failure.
        line: usize,
        /// 1-based column of the failure.
        column: usize,
        /// Parser diagnostic.
        message: String,
    },

    /// The text is valid JSON but the root is not an object.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// Kind of the value that was found instead (e.g. `"number"`).
        found: &'static str,
    },
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Syntax {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

/// A single entry rejected while processing a document.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The entry text did not parse into an object.
    #[error("entry #{index} in `{category}` could not be parsed: {source}")]
    Parse {
        /// Category path of the document.
        category: String,
        /// 0-based position of the entry within the document.
        index: usize,
        /// Underlying parse failure.
        #[source]
        source: ParseError,
    },

    /// Merge mode needs an identity to fold entries together, and this entry
    /// has none of `AssociatedQualityId`, `Id` or `Name`.
    #[error(
        "entry #{index} in `{category}` has no identity field (expected one of AssociatedQualityId, Id, Name)"
    )]
    MissingIdentity {
        /// Category path of the document.
        category: String,
        /// 0-based position of the entry within the document.
        index: usize,
    },
}

impl EntryError {
    /// Position of the rejected entry within its document.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Parse { index, .. } | Self::MissingIdentity { index, .. } => *index,
        }
    }
}

/// Failures while loading mold resources.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The mold source lists no molds at all. Nothing downstream can work
    /// without them, so this aborts the run.
    #[error("no default molds found in {location}; the mold resource set is empty or was not packaged")]
    EmptyResourceSet {
        /// Human-readable location of the mold source.
        location: String,
    },

    /// A requested mold resource does not exist.
    #[error("no {namespace} mold named `{name}`")]
    MissingResource {
        /// Namespace that was searched.
        namespace: MoldNamespace,
        /// Requested mold name.
        name: String,
    },

    /// The mold resource exists but is not a JSON object.
    #[error("{namespace} mold `{name}` is malformed: {source}")]
    Malformed {
        /// Namespace of the resource.
        namespace: MoldNamespace,
        /// Mold name.
        name: String,
        /// Underlying parse failure.
        #[source]
        source: ParseError,
    },

    /// `$ref:` directives form a loop.
    #[error("{namespace} mold alias cycle: {chain}")]
    AliasCycle {
        /// Namespace of the aliases.
        namespace: MoldNamespace,
        /// The alias chain, e.g. `A -> B -> A`.
        chain: String,
    },

    /// Reading from the mold source failed.
    #[error("I/O error reading molds: {0}")]
    Io(#[from] io::Error),
}
