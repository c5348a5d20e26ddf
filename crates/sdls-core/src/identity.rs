//! Entry identity: how merge mode recognizes "the same entry" across sources.

use std::fmt;

use serde_json::Value;

use crate::codec::JsonObject;

/// Field holding the alternate identity used by entries that describe another
/// quality (highest priority).
pub const ASSOCIATED_QUALITY_ID: &str = "AssociatedQualityId";

/// Numeric identity field.
pub const ID: &str = "Id";

/// Fallback identity field.
pub const NAME: &str = "Name";

/// Identity of an entry within its category.
///
/// Resolution order is fixed: [`ASSOCIATED_QUALITY_ID`], then [`ID`], then
/// [`NAME`]. Numeric fields must hold integers; a field with any other type is
/// skipped and the next one is tried.
///
/// Names are kept as literal strings so two differently-named entries can never
/// collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryIdentity {
    /// The one entry of a constants document.
    Singleton,
    /// Keyed by `AssociatedQualityId`.
    AssociatedQuality(i64),
    /// Keyed by `Id`.
    Id(i64),
    /// Keyed by `Name`.
    Name(String),
}

impl EntryIdentity {
    /// Resolve the identity of an entry, or `None` if it has no identity field.
    #[must_use]
    pub fn of(entry: &JsonObject) -> Option<Self> {
        if let Some(id) = entry.get(ASSOCIATED_QUALITY_ID).and_then(Value::as_i64) {
            return Some(Self::AssociatedQuality(id));
        }
        if let Some(id) = entry.get(ID).and_then(Value::as_i64) {
            return Some(Self::Id(id));
        }
        entry
            .get(NAME)
            .and_then(Value::as_str)
            .map(|name| Self::Name(name.to_owned()))
    }
}

impl fmt::Display for EntryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "0"),
            Self::AssociatedQuality(id) => write!(f, "{ASSOCIATED_QUALITY_ID} {id}"),
            Self::Id(id) => write!(f, "{ID} {id}"),
            Self::Name(name) => write!(f, "{NAME} {name:?}"),
        }
    }
}
