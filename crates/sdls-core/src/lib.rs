//! Core engine for sdls.
//!
//! Reconciles partial, author-supplied JSON documents against canonical
//! "mold" documents (schema defaults) and, in merge mode, folds many partial
//! documents for the same logical entry into one while recording field-level
//! conflicts.
//!
//! # Pipeline
//!
//! ```text
//! document text ──split──▶ entries ──parse──▶ JsonObject
//!                                               │
//!                     normalize: MoldEngine::apply(entry, category mold)
//!                     merge:     Accumulator::accumulate → apply_with_compare
//!                                               │
//!                               serialize ──join──▶ document text
//! ```
//!
//! Everything in this crate is synchronous and free of filesystem writes.
//! Reading mold resources goes through the [`registry::MoldSource`] trait so
//! callers decide where defaults come from.

pub mod accumulate;
pub mod category;
pub mod codec;
pub mod conflict;
pub mod document;
pub mod error;
pub mod identity;
pub mod mold;
pub mod normalize;
pub mod registry;

pub use accumulate::{AccumulateOutcome, Accumulator, MergeResult, MergedDocument};
pub use category::Category;
pub use codec::{JsonObject, JsonValue};
pub use conflict::{ConflictLog, ConflictOrigin, ConflictRecord};
pub use document::DocumentShape;
pub use error::{EntryError, ParseError, RegistryError};
pub use identity::EntryIdentity;
pub use mold::{FieldKind, Mold, MoldEngine, SchemaId};
pub use normalize::NormalizedDocument;
pub use registry::{DirMoldSource, MemoryMoldSource, MoldNamespace, MoldSource, Registry};
