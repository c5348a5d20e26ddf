//! Mold registry: schema name → canonical default object.
//!
//! Molds live in two namespaces:
//!
//! | Namespace | Directory | Used for |
//! |-----------|-----------|----------|
//! | [`MoldNamespace::Category`] | `default/` | whole entries of a category (`qualities`, `Tiles`, ...) |
//! | [`MoldNamespace::Component`] | `defaultComponents/` | nested sub-entities (`QualitiesRequired`, `Enhancements`, ...) |
//!
//! Keeping them apart lets a category and a nested field share a name
//! (`geography/Tiles` has a `Tiles` field with a different shape). When a
//! nested field needs a mold specific to its parent, the component can be
//! published under a path-qualified name, `Parent.Field`, which
//! [`ComponentIndex::classify`] prefers over the bare field name.
//!
//! # Loading
//!
//! Molds are loaded lazily on first request and cached for the life of the
//! registry. A resource whose whitespace-stripped text is `$ref:<Name>` is an
//! alias: `<Name>` is loaded from the same namespace and cached under the
//! requested name. Missing or malformed resources are logged and replaced by
//! an empty mold, which passes source data through untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::codec::{self, JsonObject};
use crate::error::RegistryError;
use crate::mold::{FieldKind, Mold, SchemaId};

/// Prefix of an alias directive.
pub const ALIAS_PREFIX: &str = "$ref:";

// ---------------------------------------------------------------------------
// MoldNamespace
// ---------------------------------------------------------------------------

/// Which set of molds a name refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoldNamespace {
    /// Top-level molds, one per category.
    Category,
    /// Nested sub-entity molds.
    Component,
}

impl MoldNamespace {
    /// Directory name used by [`DirMoldSource`].
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Category => "default",
            Self::Component => "defaultComponents",
        }
    }
}

impl fmt::Display for MoldNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Component => write!(f, "component"),
        }
    }
}

// ---------------------------------------------------------------------------
// MoldSource
// ---------------------------------------------------------------------------

/// Where mold text comes from.
pub trait MoldSource: Send + Sync {
    /// Every mold name available in `namespace`.
    ///
    /// # Errors
    /// Returns an I/O error if the source cannot be enumerated.
    fn names(&self, namespace: MoldNamespace) -> io::Result<Vec<String>>;

    /// Raw text of one mold, or `None` if it does not exist.
    ///
    /// # Errors
    /// Returns an I/O error if the mold exists but cannot be read.
    fn read(&self, namespace: MoldNamespace, name: &str) -> io::Result<Option<String>>;

    /// Human-readable location, for diagnostics.
    fn describe(&self) -> String;
}

/// Molds stored as `<root>/default/<name>.json` and
/// `<root>/defaultComponents/<name>.json`.
#[derive(Clone, Debug)]
pub struct DirMoldSource {
    root: PathBuf,
}

impl DirMoldSource {
    /// Create a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, namespace: MoldNamespace, name: &str) -> PathBuf {
        self.root
            .join(namespace.dir_name())
            .join(format!("{name}.json"))
    }
}

impl MoldSource for DirMoldSource {
    fn names(&self, namespace: MoldNamespace) -> io::Result<Vec<String>> {
        let dir = self.root.join(namespace.dir_name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, namespace: MoldNamespace, name: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_of(namespace, name)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Molds held in memory. Handy for tests and for embedding molds with
/// `include_str!`.
#[derive(Clone, Debug, Default)]
pub struct MemoryMoldSource {
    categories: BTreeMap<String, String>,
    components: BTreeMap<String, String>,
}

impl MemoryMoldSource {
    /// An empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category mold.
    #[must_use]
    pub fn with_category(mut self, name: &str, text: &str) -> Self {
        self.categories.insert(name.to_owned(), text.to_owned());
        self
    }

    /// Add a component mold.
    #[must_use]
    pub fn with_component(mut self, name: &str, text: &str) -> Self {
        self.components.insert(name.to_owned(), text.to_owned());
        self
    }

    const fn map(&self, namespace: MoldNamespace) -> &BTreeMap<String, String> {
        match namespace {
            MoldNamespace::Category => &self.categories,
            MoldNamespace::Component => &self.components,
        }
    }
}

impl MoldSource for MemoryMoldSource {
    fn names(&self, namespace: MoldNamespace) -> io::Result<Vec<String>> {
        Ok(self.map(namespace).keys().cloned().collect())
    }

    fn read(&self, namespace: MoldNamespace, name: &str) -> io::Result<Option<String>> {
        Ok(self.map(namespace).get(name).cloned())
    }

    fn describe(&self) -> String {
        "in-memory molds".to_owned()
    }
}

// ---------------------------------------------------------------------------
// ComponentIndex
// ---------------------------------------------------------------------------

/// The fixed set of component names, known up front.
#[derive(Clone, Debug, Default)]
pub struct ComponentIndex {
    names: BTreeSet<String>,
}

impl ComponentIndex {
    /// Build an index from component names.
    #[must_use]
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Whether a component with exactly this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of known components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no components are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Decide how field `key` of a mold scoped at `scope` is treated.
    ///
    /// `scope.key` wins over `key` so a parent can own a specialized mold for
    /// one of its fields.
    #[must_use]
    pub fn classify(&self, scope: Option<&str>, key: &str) -> FieldKind {
        if let Some(parent) = scope {
            let qualified = SchemaId::qualified(parent, key);
            if self.contains(qualified.as_str()) {
                return FieldKind::Schema(qualified);
            }
        }
        if self.contains(key) {
            FieldKind::Schema(SchemaId::new(key))
        } else {
            FieldKind::Generic
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type MoldCache = RwLock<HashMap<String, Arc<Mold>>>;

/// Lazily-populated, thread-safe mold cache.
pub struct Registry {
    source: Box<dyn MoldSource>,
    index: ComponentIndex,
    categories: MoldCache,
    components: MoldCache,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("source", &self.source.describe())
            .field("components", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Build a registry over `source`.
    ///
    /// # Errors
    /// Returns [`RegistryError::EmptyResourceSet`] when the source has neither
    /// category nor component molds, and [`RegistryError::Io`] when it cannot
    /// be enumerated.
    pub fn new(source: impl MoldSource + 'static) -> Result<Self, RegistryError> {
        let components = source.names(MoldNamespace::Component)?;
        let categories = source.names(MoldNamespace::Category)?;
        if components.is_empty() && categories.is_empty() {
            return Err(RegistryError::EmptyResourceSet {
                location: source.describe(),
            });
        }
        for name in &components {
            tracing::trace!(component = %name, "component registered");
        }
        tracing::debug!(
            components = components.len(),
            categories = categories.len(),
            source = %source.describe(),
            "mold registry ready"
        );
        Ok(Self {
            source: Box::new(source),
            index: ComponentIndex::new(components),
            categories: RwLock::default(),
            components: RwLock::default(),
        })
    }

    /// The set of known component names.
    #[must_use]
    pub const fn index(&self) -> &ComponentIndex {
        &self.index
    }

    /// The mold for a category, by mold name (e.g. `qualities`).
    #[must_use]
    pub fn category(&self, name: &str) -> Arc<Mold> {
        self.lookup(MoldNamespace::Category, name)
    }

    /// The mold for a nested component.
    #[must_use]
    pub fn component(&self, id: &SchemaId) -> Arc<Mold> {
        self.lookup(MoldNamespace::Component, id.as_str())
    }

    const fn cache(&self, namespace: MoldNamespace) -> &MoldCache {
        match namespace {
            MoldNamespace::Category => &self.categories,
            MoldNamespace::Component => &self.components,
        }
    }

    fn lookup(&self, namespace: MoldNamespace, name: &str) -> Arc<Mold> {
        let cache = self.cache(namespace);
        if let Some(mold) = cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(mold);
        }

        let mold = match self.load_defaults(namespace, name, &mut Vec::new()) {
            Ok(defaults) => Mold::new(name, defaults, &self.index),
            Err(err) => {
                match &err {
                    RegistryError::MissingResource { .. } => {
                        tracing::warn!("{err}; entries will pass through without defaults");
                    }
                    _ => tracing::error!("{err}; entries will pass through without defaults"),
                }
                Mold::unresolved(name)
            }
        };

        let mut writer = cache.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            writer
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(mold)),
        )
    }

    fn load_defaults(
        &self,
        namespace: MoldNamespace,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<JsonObject, RegistryError> {
        if chain.iter().any(|seen| seen == name) {
            chain.push(name.to_owned());
            return Err(RegistryError::AliasCycle {
                namespace,
                chain: chain.join(" -> "),
            });
        }
        chain.push(name.to_owned());

        let text =
            self.source
                .read(namespace, name)?
                .ok_or_else(|| RegistryError::MissingResource {
                    namespace,
                    name: name.to_owned(),
                })?;

        if let Some(target) = alias_target(&text) {
            tracing::debug!(%namespace, alias = name, target = %target, "resolving mold alias");
            return self.load_defaults(namespace, &target, chain);
        }

        codec::parse_object(&text).map_err(|source| RegistryError::Malformed {
            namespace,
            name: name.to_owned(),
            source,
        })
    }
}

/// If `text` is an alias directive, the name it points at.
fn alias_target(text: &str) -> Option<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .strip_prefix(ALIAS_PREFIX)
        .filter(|target| !target.is_empty())
        .map(str::to_owned)
}
