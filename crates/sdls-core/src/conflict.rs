//! Conflict log: a side channel of field-level overwrites seen while merging.
//!
//! A conflict is recorded when a later source replaces a value that an earlier
//! source had customized, and the replacement is not simply the default.
//! The decision lives in [`crate::mold::merge`]; this module only collects and
//! persists what was decided.
//!
//! One line per conflict:
//!
//! ```text
//! [entities/qualities] Id 502 .Name: "Fuel" -> "Fuel+" (from gooder-fuel)
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::category::Category;
use crate::codec::{self, JsonValue};
use crate::identity::EntryIdentity;

// ---------------------------------------------------------------------------
// ConflictOrigin
// ---------------------------------------------------------------------------

/// Where an incoming value came from: which entry, in which category, from
/// which source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictOrigin {
    /// Category of the document being merged.
    pub category: Category,
    /// Identity of the entry being merged.
    pub identity: EntryIdentity,
    /// Label of the source supplying the new value (usually a mod folder).
    pub source: String,
}

impl ConflictOrigin {
    /// Create a new origin.
    #[must_use]
    pub fn new(category: &Category, identity: &EntryIdentity, source: &str) -> Self {
        Self {
            category: category.clone(),
            identity: identity.clone(),
            source: source.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConflictRecord
// ---------------------------------------------------------------------------

/// One overwritten field.
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictRecord {
    /// Category path.
    pub category: String,
    /// Identity of the top-level entry, rendered.
    pub identity: String,
    /// Path of the field inside the entry, e.g. `.Enhancements[Id 3].Level`.
    pub field: String,
    /// Value held before the overwrite.
    pub old: JsonValue,
    /// Value that replaced it.
    pub new: JsonValue,
    /// Source that supplied `new`.
    pub source: String,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {} -> {} (from {})",
            self.category,
            self.identity,
            self.field,
            codec::serialize(&self.old),
            codec::serialize(&self.new),
            self.source,
        )
    }
}

// ---------------------------------------------------------------------------
// ConflictLog
// ---------------------------------------------------------------------------

/// Accumulated conflicts for one run.
#[derive(Clone, Debug, Default)]
pub struct ConflictLog {
    records: Vec<ConflictRecord>,
}

impl ConflictLog {
    /// An empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record that `field` of the entry described by `origin` went from `old`
    /// to `new`.
    pub fn record(
        &mut self,
        origin: &ConflictOrigin,
        field: &str,
        old: &JsonValue,
        new: &JsonValue,
    ) {
        let record = ConflictRecord {
            category: origin.category.to_string(),
            identity: origin.identity.to_string(),
            field: field.to_owned(),
            old: old.clone(),
            new: new.clone(),
            source: origin.source.clone(),
        };
        tracing::warn!(
            category = %record.category,
            identity = %record.identity,
            field = %record.field,
            source = %record.source,
            "merge conflict: {} -> {}",
            codec::serialize(old),
            codec::serialize(new),
        );
        self.records.push(record);
    }

    /// All records, in the order they were recorded.
    #[must_use]
    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }

    /// Number of recorded conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no conflict was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the log as text, one line per record.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.to_string());
            out.push('\n');
        }
        out
    }

    /// Write the log to `path`, replacing any previous log.
    ///
    /// Nothing is written when the log is empty. Returns whether a file was
    /// written.
    ///
    /// # Errors
    /// Returns any I/O error from creating the parent directory or writing.
    pub fn flush_to(&self, path: &Path) -> io::Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn origin() -> ConflictOrigin {
        ConflictOrigin::new(
            &Category::new("constants/x"),
            &EntryIdentity::Singleton,
            "mod-b",
        )
    }

    #[test]
    fn record_and_render() {
        let mut log = ConflictLog::new();
        log.record(&origin(), ".Foo", &json!(1), &json!(2));
        assert_eq!(log.len(), 1);
        assert_eq!(log.render(), "[constants/x] 0 .Foo: 1 -> 2 (from mod-b)\n");
    }

    #[test]
    fn empty_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflicts.log");
        assert!(!ConflictLog::new().flush_to(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn flush_overwrites_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("conflicts.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale line\nanother\n").unwrap();

        let mut log = ConflictLog::new();
        log.record(&origin(), ".Foo", &json!("a"), &json!("b"));
        assert!(log.flush_to(&path).unwrap());

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[constants/x] 0 .Foo: \"a\" -> \"b\" (from mod-b)\n");
    }
}
