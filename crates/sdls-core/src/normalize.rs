//! Document-level normalize mode.
//!
//! Splits a document body into entries, applies each one to the category mold,
//! and joins the results. An entry that cannot be parsed is passed through as
//! its raw text and reported; the rest of the document is still processed.

use serde_json::Value;

use crate::category::Category;
use crate::codec;
use crate::document::{self, ENTRY_SEPARATOR};
use crate::error::EntryError;
use crate::mold::MoldEngine;

/// Result of normalizing one document body.
#[derive(Debug, Default)]
pub struct NormalizedDocument {
    /// Joined entries, without on-disk framing.
    pub body: String,
    /// Number of entries written to `body`, including pass-through ones.
    pub entries: usize,
    /// Entries that were passed through unprocessed.
    pub passthrough: Vec<EntryError>,
}

impl NormalizedDocument {
    /// Whether every entry was normalized.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.passthrough.is_empty()
    }
}

impl MoldEngine<'_> {
    /// Normalize an unframed document body of `category`.
    #[must_use]
    pub fn normalize_document(&self, category: &Category, body: &str) -> NormalizedDocument {
        let shape = category.shape();
        let mold = self.registry().category(category.name());
        let mut out = NormalizedDocument::default();
        let mut entries = Vec::new();

        for (index, raw) in shape.split(body).into_iter().enumerate() {
            if raw.is_empty() {
                continue;
            }
            match codec::parse_object(&raw) {
                Ok(fields) => {
                    let applied = self.apply(&fields, &mold);
                    entries.push(codec::serialize(&Value::Object(applied)));
                }
                Err(source) => {
                    let err = EntryError::Parse {
                        category: category.to_string(),
                        index,
                        source,
                    };
                    tracing::error!("{err}; passing entry through unchanged");
                    out.passthrough.push(err);
                    entries.push(raw);
                }
            }
        }

        out.entries = entries.len();
        out.body = document::join(&entries, ENTRY_SEPARATOR);
        out
    }
}
