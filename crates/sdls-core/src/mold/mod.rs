//! Mold application engine.
//!
//! A [`Mold`] is the canonical default object for a schema. Applying a source
//! entry to a mold yields the mold's shape populated with what the source
//! supplied, recursing into nested sub-entities with their own molds.
//!
//! Two modes share one traversal:
//!
//! - **normalize** ([`MoldEngine::apply`]): source × mold → complete entry.
//! - **merge** ([`MoldEngine::apply_with_compare`]): source × previously
//!   merged entry × baseline mold → merged entry, recording conflicts.
//!
//! # Field dispatch
//!
//! Every field is classified once as [`FieldKind::Schema`] (its value is a
//! sub-entity, or array of sub-entities, with its own mold) or
//! [`FieldKind::Generic`] (plain data). Classification for a mold's own keys is
//! computed when the mold is loaded; keys the mold does not declare are
//! classified through the registry's [`ComponentIndex`].

mod apply;
pub mod merge;


use std::collections::BTreeMap;
use std::fmt;

use crate::codec::JsonObject;
use crate::identity::EntryIdentity;
use crate::registry::{ComponentIndex, Registry};

// ---------------------------------------------------------------------------
// SchemaId
// ---------------------------------------------------------------------------

/// Name of a component mold, possibly path-qualified (`Tiles.Tiles`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(String);

impl SchemaId {
    /// A bare component name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `parent.field`
    #[must_use]
    pub fn qualified(parent: &str, field: &str) -> Self {
        Self(format!("{parent}.{field}"))
    }

    /// The registry key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

/// How a field's value is treated during application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// The value is a sub-entity (or array of them) shaped by this component.
    Schema(SchemaId),
    /// Plain data.
    Generic,
}

// ---------------------------------------------------------------------------
// Mold
// ---------------------------------------------------------------------------

/// A schema's canonical default object plus precomputed field dispatch.
#[derive(Clone, Debug, Default)]
pub struct Mold {
    name: Option<String>,
    defaults: JsonObject,
    kinds: BTreeMap<String, FieldKind>,
}

impl Mold {
    /// A named mold. Field kinds for every default key are resolved now.
    #[must_use]
    pub fn new(name: &str, defaults: JsonObject, index: &ComponentIndex) -> Self {
        let kinds = defaults
            .keys()
            .map(|key| (key.clone(), index.classify(Some(name), key)))
            .collect();
        Self {
            name: Some(name.to_owned()),
            defaults,
            kinds,
        }
    }

    /// Placeholder for a named mold that could not be loaded.
    #[must_use]
    pub fn unresolved(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::default()
        }
    }

    /// The empty mold used for plain nested objects.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An unnamed mold over existing defaults. Used as the comparison baseline
    /// for plain nested objects in merge mode.
    #[must_use]
    pub fn anonymous_with(defaults: JsonObject) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// This mold with `overrides` layered over its defaults. Keeps the name,
    /// so nested fields still classify in this mold's scope.
    #[must_use]
    pub fn overlaid(&self, overrides: &JsonObject, index: &ComponentIndex) -> Self {
        let mut defaults = self.defaults.clone();
        for (key, value) in overrides {
            defaults.insert(key.clone(), value.clone());
        }
        match self.name() {
            Some(name) => Self::new(name, defaults, index),
            None => Self::anonymous_with(defaults),
        }
    }

    /// Mold name, `None` for anonymous molds.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The default object.
    #[must_use]
    pub const fn defaults(&self) -> &JsonObject {
        &self.defaults
    }

    /// Whether the mold declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    /// Whether a plain field named `key` may appear in normalized output.
    ///
    /// A mold that declares fields only admits those fields. An empty mold
    /// admits everything: it has no shape to enforce.
    #[must_use]
    pub fn admits(&self, key: &str) -> bool {
        self.defaults.is_empty() || self.defaults.contains_key(key)
    }

    /// Dispatch for field `key`.
    #[must_use]
    pub fn field_kind(&self, key: &str, index: &ComponentIndex) -> FieldKind {
        self.kinds
            .get(key)
            .cloned()
            .unwrap_or_else(|| index.classify(self.name(), key))
    }

    fn label(&self) -> &str {
        self.name().unwrap_or("<anonymous>")
    }
}

// ---------------------------------------------------------------------------
// FieldPath
// ---------------------------------------------------------------------------

/// Location of a field inside an entry, used in conflict records.
///
/// Rendered as `.Field`, `.Array[Id 3].Field`, ...
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    /// The entry itself.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// A named field below this path.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        Self(format!("{}.{key}", self.0))
    }

    /// An identified array element below this path.
    #[must_use]
    pub fn element(&self, identity: &EntryIdentity) -> Self {
        Self(format!("{}[{identity}]", self.0))
    }

    /// Rendered path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MoldEngine
// ---------------------------------------------------------------------------

/// Applies entries to molds, fetching nested molds from a [`Registry`].
#[derive(Clone, Copy, Debug)]
pub struct MoldEngine<'r> {
    registry: &'r Registry,
}

impl<'r> MoldEngine<'r> {
    /// An engine backed by `registry`.
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// The backing registry.
    #[must_use]
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }
}
