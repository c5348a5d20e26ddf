//! Multi-source merge accumulator.
//!
//! Folds documents from many sources into one merged document per category.
//! Entries are keyed by `(category, identity)`:
//!
//! - first sighting of an identity → stored as written;
//! - later sightings → merged into the stored entry by
//!   [`MoldEngine::apply_with_compare`], conflicts going to the shared log.
//!
//! Constants documents hold a single object and always use
//! [`EntryIdentity::Singleton`], so later sources simply layer on top.
//!
//! Shipped base data can be seeded first with [`Accumulator::seed_baseline`].
//! A seeded entry becomes the comparison baseline for its identity: a mod that
//! changes base data is not in conflict with anything, two mods that change
//! the same base value differently are.
//!
//! After all sources are in, [`Accumulator::finish`] serializes each category,
//! joins it, and runs it through normalize mode once more so the written
//! document is mold-complete.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::category::Category;
use crate::codec::{self, JsonObject};
use crate::conflict::{ConflictLog, ConflictOrigin};
use crate::document::{self, DocumentShape, ENTRY_SEPARATOR};
use crate::error::EntryError;
use crate::identity::EntryIdentity;
use crate::mold::{Mold, MoldEngine};
use crate::normalize::NormalizedDocument;

/// Counters for one [`Accumulator::accumulate`] call.
#[derive(Debug, Default)]
pub struct AccumulateOutcome {
    /// Entries whose identity had not been seen before.
    pub inserted: usize,
    /// Entries merged into an existing identity.
    pub merged: usize,
    /// Entries that were rejected.
    pub rejected: Vec<EntryError>,
}

/// One merged category, ready to be framed and written.
#[derive(Debug)]
pub struct MergedDocument {
    /// The category.
    pub category: Category,
    /// Normalized, joined body without on-disk framing.
    pub document: NormalizedDocument,
}

/// Output of [`Accumulator::finish`].
#[derive(Debug, Default)]
pub struct MergeResult {
    /// One document per category that received at least one entry.
    pub documents: Vec<MergedDocument>,
    /// Every conflict recorded during the run.
    pub conflicts: ConflictLog,
}

#[derive(Debug)]
struct Slot {
    merged: JsonObject,
    baseline: Option<Arc<Mold>>,
}

/// Accumulates entries for merge mode.
#[derive(Debug)]
pub struct Accumulator<'r> {
    engine: MoldEngine<'r>,
    categories: BTreeMap<Category, BTreeMap<EntryIdentity, Slot>>,
    conflicts: ConflictLog,
}

impl<'r> Accumulator<'r> {
    /// An empty accumulator.
    #[must_use]
    pub fn new(engine: MoldEngine<'r>) -> Self {
        Self {
            engine,
            categories: BTreeMap::new(),
            conflicts: ConflictLog::new(),
        }
    }

    /// Conflicts recorded so far.
    #[must_use]
    pub const fn conflicts(&self) -> &ConflictLog {
        &self.conflicts
    }

    /// Number of distinct entries held for `category`.
    #[must_use]
    pub fn entry_count(&self, category: &Category) -> usize {
        self.categories.get(category).map_or(0, BTreeMap::len)
    }

    /// Fold one document (on-disk text, framing included) from `source` into
    /// the accumulator.
    pub fn accumulate(
        &mut self,
        category: &Category,
        text: &str,
        source: &str,
    ) -> AccumulateOutcome {
        let category_mold = self.engine.registry().category(category.name());
        let mut outcome = AccumulateOutcome::default();

        for (index, entry) in parse_entries(category, text, &mut outcome.rejected) {
            let slots = self.categories.entry(category.clone()).or_default();
            if let Some(slot) = slots.get_mut(&entry.identity) {
                let origin = ConflictOrigin::new(category, &entry.identity, source);
                let baseline = slot.baseline.as_ref().unwrap_or(&category_mold);
                slot.merged = self.engine.apply_with_compare(
                    &entry.fields,
                    &slot.merged,
                    baseline,
                    &origin,
                    &mut self.conflicts,
                );
                tracing::trace!(%category, identity = %entry.identity, index, source, "entry merged");
                outcome.merged += 1;
            } else {
                slots.insert(
                    entry.identity,
                    Slot {
                        merged: entry.fields,
                        baseline: None,
                    },
                );
                outcome.inserted += 1;
            }
        }

        tracing::debug!(
            %category,
            source,
            inserted = outcome.inserted,
            merged = outcome.merged,
            rejected = outcome.rejected.len(),
            "document accumulated"
        );
        outcome
    }

    /// Seed shipped base data for `category`.
    ///
    /// Seeded entries start the merge and serve as the comparison baseline for
    /// their identity. Must be called before any mod document of the same
    /// category is accumulated; a base entry for an identity that is already
    /// present only replaces its baseline.
    pub fn seed_baseline(&mut self, category: &Category, text: &str) -> AccumulateOutcome {
        let category_mold = self.engine.registry().category(category.name());
        let index = self.engine.registry().index();
        let mut outcome = AccumulateOutcome::default();

        for (_, entry) in parse_entries(category, text, &mut outcome.rejected) {
            let normalized = self.engine.apply(&entry.fields, &category_mold);
            let baseline = Arc::new(Mold::new(category.name(), normalized, index));
            let slots = self.categories.entry(category.clone()).or_default();
            if let Some(slot) = slots.get_mut(&entry.identity) {
                tracing::warn!(%category, identity = %entry.identity, "duplicate entry in base data");
                slot.baseline = Some(baseline);
                outcome.merged += 1;
            } else {
                slots.insert(
                    entry.identity,
                    Slot {
                        merged: entry.fields,
                        baseline: Some(baseline),
                    },
                );
                outcome.inserted += 1;
            }
        }
        outcome
    }

    /// Serialize, join and re-normalize every category.
    #[must_use]
    pub fn finish(self) -> MergeResult {
        let engine = self.engine;
        let documents = self
            .categories
            .into_iter()
            .map(|(category, slots)| {
                let entries: Vec<String> = slots
                    .into_values()
                    .map(|slot| codec::serialize(&Value::Object(slot.merged)))
                    .collect();
                let joined = document::join(&entries, ENTRY_SEPARATOR);
                let document = engine.normalize_document(&category, &joined);
                MergedDocument { category, document }
            })
            .collect();
        MergeResult {
            documents,
            conflicts: self.conflicts,
        }
    }
}

struct ParsedEntry {
    identity: EntryIdentity,
    fields: JsonObject,
}

/// Split and parse a framed document into identified entries, collecting the
/// ones that must be rejected.
fn parse_entries(
    category: &Category,
    text: &str,
    rejected: &mut Vec<EntryError>,
) -> Vec<(usize, ParsedEntry)> {
    let shape = category.shape();
    let mut parsed = Vec::new();

    for (index, raw) in shape.split(shape.unwrap(text)).into_iter().enumerate() {
        if raw.is_empty() {
            continue;
        }
        let fields = match codec::parse_object(&raw) {
            Ok(fields) => fields,
            Err(source) => {
                let err = EntryError::Parse {
                    category: category.to_string(),
                    index,
                    source,
                };
                tracing::error!("{err}; entry skipped");
                rejected.push(err);
                continue;
            }
        };
        let identity = if shape == DocumentShape::Constants {
            EntryIdentity::Singleton
        } else if let Some(identity) = EntryIdentity::of(&fields) {
            identity
        } else {
            let err = EntryError::MissingIdentity {
                category: category.to_string(),
                index,
            };
            tracing::error!("{err}; entry rejected");
            rejected.push(err);
            continue;
        };
        parsed.push((index, ParsedEntry { identity, fields }));
    }
    parsed
}
