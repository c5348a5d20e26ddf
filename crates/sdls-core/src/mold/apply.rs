//! Normalize mode: source × mold → complete entry.

use serde_json::Value;

use super::{FieldKind, Mold, MoldEngine, SchemaId};
use crate::codec::{JsonObject, JsonValue};

impl MoldEngine<'_> {
    /// Apply `source` to `mold`.
    ///
    /// The result starts as a copy of the mold's defaults. Each source field
    /// then overwrites its slot:
    ///
    /// - schema fields are applied against their component mold (element-wise
    ///   for arrays, order preserved);
    /// - plain objects are applied against an empty mold, so only what the
    ///   source wrote survives;
    /// - everything else is copied.
    ///
    /// Plain fields the mold does not declare are dropped. Schema fields are
    /// always kept.
    #[must_use]
    pub fn apply(&self, source: &JsonObject, mold: &Mold) -> JsonObject {
        let index = self.registry.index();
        let mut result = mold.defaults().clone();
        for (key, value) in source {
            let applied = match mold.field_kind(key, index) {
                FieldKind::Schema(id) => self.apply_schema_field(value, &id),
                FieldKind::Generic => {
                    if !mold.admits(key) {
                        tracing::debug!(mold = mold.label(), field = %key, "dropping field not declared by mold");
                        continue;
                    }
                    self.apply_generic(value)
                }
            };
            result.insert(key.clone(), applied);
        }
        result
    }

    fn apply_schema_field(&self, value: &JsonValue, id: &SchemaId) -> JsonValue {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.apply_schema_object(item, id))
                    .collect(),
            ),
            other => self.apply_schema_object(other, id),
        }
    }

    fn apply_schema_object(&self, value: &JsonValue, id: &SchemaId) -> JsonValue {
        match value {
            Value::Object(fields) => {
                let mold = self.registry.component(id);
                Value::Object(self.apply(fields, &mold))
            }
            other => other.clone(),
        }
    }

    fn apply_generic(&self, value: &JsonValue) -> JsonValue {
        match value {
            Value::Object(fields) => Value::Object(self.apply(fields, &Mold::anonymous())),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.apply_generic(item)).collect())
            }
            other => other.clone(),
        }
    }
}
