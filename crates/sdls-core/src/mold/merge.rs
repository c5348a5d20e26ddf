//! Merge mode: fold one more source into an already-merged entry.
//!
//! The traversal mirrors normalize mode, with three inputs per level:
//!
//! - `source`: what the incoming author wrote,
//! - `target`: the entry merged so far,
//! - `baseline`: the canonical default the comparison is made against.
//!
//! Leaves always take the incoming value. The baseline only decides whether
//! the overwrite is reported: see [`is_conflict`].
//!
//! Arrays under schema fields hold sub-entities and are merged by identity:
//!
//! ```text
//! target:   [{Id:1, Level:2}, {Id:2}]
//! incoming: [{Id:2, Level:5}, {Id:3}]
//! merged:   [{Id:1, Level:2}, {Id:2, Level:5}, {Id:3}]
//! ```
//!
//! Elements without an identity, and non-object elements, are appended.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{FieldKind, FieldPath, Mold, MoldEngine};
use crate::codec::{self, JsonObject, JsonValue};
use crate::conflict::{ConflictLog, ConflictOrigin};
use crate::identity::EntryIdentity;
use crate::registry::ComponentIndex;

/// Whether replacing `existing` with `incoming` must be reported.
///
/// Three values are compared: the incoming value, the value merged so far,
/// and the baseline default. An overwrite is a conflict only when all three
/// differ:
///
/// | existing | incoming | baseline | conflict |
/// |----------|----------|----------|----------|
/// | 1 | 2 | 0 | yes |
/// | 1 | 0 | 0 | no: incoming reverts to the default |
/// | 0 | 2 | 0 | no: existing was still the default |
/// | 1 | 1 | 0 | no: same value |
///
/// With no baseline for the field, any change is a conflict.
#[must_use]
pub fn is_conflict(
    existing: &JsonValue,
    incoming: &JsonValue,
    baseline: Option<&JsonValue>,
) -> bool {
    if codec::same_value(existing, incoming) {
        return false;
    }
    baseline.is_none_or(|default| {
        !codec::same_value(incoming, default) && !codec::same_value(existing, default)
    })
}

/// Baselines for the elements of one entity array.
///
/// Elements the baseline array holds (seeded base data) compare against
/// themselves layered over the component mold; any other element compares
/// against the component mold alone.
struct ElementBaselines<'a> {
    component: Arc<Mold>,
    seeded: HashMap<EntryIdentity, &'a JsonObject>,
}

impl<'a> ElementBaselines<'a> {
    fn new(component: Arc<Mold>, baseline: Option<&'a JsonValue>) -> Self {
        let seeded = baseline
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .filter_map(|fields| EntryIdentity::of(fields).map(|identity| (identity, fields)))
            .collect();
        Self { component, seeded }
    }

    fn for_identity(&self, identity: &EntryIdentity, index: &ComponentIndex) -> Cow<'_, Mold> {
        match self.seeded.get(identity) {
            Some(fields) => Cow::Owned(self.component.overlaid(fields, index)),
            None => Cow::Borrowed(&*self.component),
        }
    }
}

impl MoldEngine<'_> {
    /// Merge `source` into `merge_target`, comparing against
    /// `compare_baseline`.
    ///
    /// Returns the new merged entry. Conflicts are appended to `log`, tagged
    /// with `origin`.
    #[must_use]
    pub fn apply_with_compare(
        &self,
        source: &JsonObject,
        merge_target: &JsonObject,
        compare_baseline: &Mold,
        origin: &ConflictOrigin,
        log: &mut ConflictLog,
    ) -> JsonObject {
        let root = FieldPath::root();
        self.merge_object(source, merge_target, compare_baseline, &root, origin, log)
    }

    fn merge_object(
        &self,
        source: &JsonObject,
        target: &JsonObject,
        baseline: &Mold,
        path: &FieldPath,
        origin: &ConflictOrigin,
        log: &mut ConflictLog,
    ) -> JsonObject {
        let index = self.registry.index();
        let mut merged = target.clone();
        for (key, incoming) in source {
            let field_path = path.child(key);
            let existing = target.get(key);
            let default = baseline.defaults().get(key);

            let value = match (baseline.field_kind(key, index), incoming, existing) {
                (FieldKind::Schema(id), Value::Array(items), _) => {
                    let elements = ElementBaselines::new(self.registry.component(&id), default);
                    Value::Array(self.merge_entity_array(
                        existing,
                        items,
                        &elements,
                        &field_path,
                        origin,
                        log,
                    ))
                }
                (FieldKind::Schema(id), Value::Object(fields), Some(Value::Object(current))) => {
                    let component = self.registry.component(&id);
                    let nested = match default.and_then(Value::as_object) {
                        Some(seeded) => Cow::Owned(component.overlaid(seeded, index)),
                        None => Cow::Borrowed(&*component),
                    };
                    Value::Object(
                        self.merge_object(fields, current, &nested, &field_path, origin, log),
                    )
                }
                (FieldKind::Generic, Value::Object(fields), Some(Value::Object(current))) => {
                    let nested = Mold::anonymous_with(
                        default
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default(),
                    );
                    Value::Object(
                        self.merge_object(fields, current, &nested, &field_path, origin, log),
                    )
                }
                _ => Self::merge_leaf(existing, incoming, default, &field_path, origin, log),
            };
            merged.insert(key.clone(), value);
        }
        merged
    }

    fn merge_leaf(
        existing: Option<&JsonValue>,
        incoming: &JsonValue,
        default: Option<&JsonValue>,
        path: &FieldPath,
        origin: &ConflictOrigin,
        log: &mut ConflictLog,
    ) -> JsonValue {
        if let Some(current) = existing
            && is_conflict(current, incoming, default)
        {
            log.record(origin, path.as_str(), current, incoming);
        }
        incoming.clone()
    }

    fn merge_entity_array(
        &self,
        existing: Option<&JsonValue>,
        incoming: &[JsonValue],
        baselines: &ElementBaselines<'_>,
        path: &FieldPath,
        origin: &ConflictOrigin,
        log: &mut ConflictLog,
    ) -> Vec<JsonValue> {
        let mut merged = match existing {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                tracing::debug!(
                    field = %path,
                    found = codec::kind_name(other),
                    "replacing non-array value with merged array"
                );
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut positions: HashMap<EntryIdentity, usize> = HashMap::new();
        for (pos, item) in merged.iter().enumerate() {
            if let Some(identity) = item.as_object().and_then(EntryIdentity::of) {
                positions.entry(identity).or_insert(pos);
            }
        }

        let index = self.registry.index();
        for item in incoming {
            let Some(fields) = item.as_object() else {
                merged.push(item.clone());
                continue;
            };
            let Some(identity) = EntryIdentity::of(fields) else {
                merged.push(item.clone());
                continue;
            };
            if let Some(&pos) = positions.get(&identity)
                && let Some(current) = merged[pos].as_object()
            {
                let element_path = path.element(&identity);
                let mold = baselines.for_identity(&identity, index);
                let updated = self.merge_object(fields, current, &mold, &element_path, origin, log);
                merged[pos] = Value::Object(updated);
            } else {
                positions.insert(identity, merged.len());
                merged.push(item.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::category::Category;
    use crate::registry::{MemoryMoldSource, Registry};

    fn registry() -> Registry {
        Registry::new(
            MemoryMoldSource::new()
                .with_category("x", r#"{"Foo": 0}"#)
                .with_category(
                    "qualities",
                    r#"{"Id": -1, "Name": "", "Tags": [], "Image": {"Path": "", "Scale": 1},
                        "Enhancements": []}"#,
                )
                .with_component("Enhancements", r#"{"Id": -1, "Level": 0}"#)
                .with_component("Unlock", r#"{"Quality": 0, "Level": 1}"#),
        )
        .unwrap()
    }

    fn obj(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    fn origin(category: &str) -> ConflictOrigin {
        ConflictOrigin::new(&Category::new(category), &EntryIdentity::Id(1), "mod-b")
    }

    #[test]
    fn conflict_rule() {
        assert!(is_conflict(&json!(1), &json!(2), Some(&json!(0))));
        assert!(!is_conflict(&json!(1), &json!(0), Some(&json!(0))));
        assert!(!is_conflict(&json!(0), &json!(2), Some(&json!(0))));
        assert!(!is_conflict(&json!(1), &json!(1), Some(&json!(0))));
        assert!(is_conflict(&json!(1), &json!(2), None));
        assert!(!is_conflict(&json!(1), &json!(1.0), None));
    }

    #[test]
    fn overwrite_of_customized_value_is_logged() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Foo": 2})),
            &obj(json!({"Foo": 1})),
            &registry.category("x"),
            &origin("constants/x"),
            &mut log,
        );
        assert_eq!(out["Foo"], json!(2));
        assert_eq!(log.len(), 1);
        let record = &log.records()[0];
        assert_eq!(record.field, ".Foo");
        assert_eq!(record.old, json!(1));
        assert_eq!(record.new, json!(2));
    }

    #[test]
    fn reverting_to_default_is_applied_silently() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Foo": 0})),
            &obj(json!({"Foo": 1})),
            &registry.category("x"),
            &origin("constants/x"),
            &mut log,
        );
        assert_eq!(out["Foo"], json!(0));
        assert!(log.is_empty());
    }

    #[test]
    fn untouched_fields_survive() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Id": 1, "Tags": ["b"]})),
            &obj(json!({"Id": 1, "Name": "Fuel"})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert_eq!(Value::Object(out), json!({"Id": 1, "Name": "Fuel", "Tags": ["b"]}));
        assert!(log.is_empty());
    }

    #[test]
    fn plain_nested_objects_merge_per_field() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Image": {"Scale": 3}})),
            &obj(json!({"Image": {"Path": "a.png", "Scale": 2}})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert_eq!(out["Image"], json!({"Path": "a.png", "Scale": 3}));
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].field, ".Image.Scale");
    }

    #[test]
    fn nested_default_is_not_a_conflict() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let _ = engine.apply_with_compare(
            &obj(json!({"Image": {"Scale": 3}})),
            &obj(json!({"Image": {"Scale": 1}})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert!(log.is_empty());
    }

    #[test]
    fn entity_arrays_merge_by_identity() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Enhancements": [{"Id": 2, "Level": 5}, {"Id": 3, "Level": 1}, 7]})),
            &obj(json!({"Enhancements": [{"Id": 1, "Level": 2}, {"Id": 2, "Level": 4}]})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert_eq!(
            out["Enhancements"],
            json!([
                {"Id": 1, "Level": 2},
                {"Id": 2, "Level": 5},
                {"Id": 3, "Level": 1},
                7
            ])
        );
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].field, ".Enhancements[Id 2].Level");
    }

    #[test]
    fn entity_array_defaults_come_from_component_mold() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let _ = engine.apply_with_compare(
            &obj(json!({"Enhancements": [{"Id": 2, "Level": 0}]})),
            &obj(json!({"Enhancements": [{"Id": 2, "Level": 4}]})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert!(log.is_empty());
    }

    #[test]
    fn schema_object_merges_against_component_mold() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Unlock": {"Level": 3}})),
            &obj(json!({"Unlock": {"Quality": 9, "Level": 2}})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert_eq!(out["Unlock"], json!({"Quality": 9, "Level": 3}));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn generic_arrays_are_replaced() {
        let registry = registry();
        let engine = MoldEngine::new(&registry);
        let mut log = ConflictLog::new();
        let out = engine.apply_with_compare(
            &obj(json!({"Tags": ["c"]})),
            &obj(json!({"Tags": ["a", "b"]})),
            &registry.category("qualities"),
            &origin("entities/qualities"),
            &mut log,
        );
        assert_eq!(out["Tags"], json!(["c"]));
        assert_eq!(log.len(), 1);
    }
}
