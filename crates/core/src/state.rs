//! Merge and projection rules for store data.
//!
//! `merge_property` commits a partial update into the raw data map;
//! `project` derives the externally visible snapshot. Both are pure: the store
//! wrapper owns locking and change notification.

use serde_json::{Map, Value};

use crate::schema::Schema;

/// Raw (committed) or derived store state.
pub type StateMap = Map<String, Value>;

/// Objects and arrays are merged key by key; everything else is replaced.
pub fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Commit `update` into `data[property]`.
///
/// - Keys without a schema entry are replaced directly.
/// - An unset (absent or null) key is first seeded from the schema default,
///   or an empty object when the entry has none.
/// - A non-composite current value is replaced when `update` is non-null.
/// - A composite current value keeps the keys `update` does not mention;
///   missing nested fields are then seeded from their defaults.
pub fn merge_property(data: &mut StateMap, schema: Option<&Schema>, property: &str, update: Value) {
    let Some(spec) = schema.and_then(|s| s.get(property)) else {
        data.insert(property.to_string(), update);
        return;
    };

    let slot = data.entry(property.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = spec
            .default_value()
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
    }

    if !is_composite(slot) {
        if !update.is_null() {
            *slot = update;
        }
        return;
    }

    merge_composite(slot, update);

    if let Value::Object(fields) = slot {
        for (field, sub) in spec.fields() {
            if fields.get(field).is_none_or(Value::is_null) {
                if let Some(default) = sub.default_value() {
                    fields.insert(field.to_string(), default.clone());
                }
            }
        }
    }
}

fn merge_composite(current: &mut Value, update: Value) {
    match (current, update) {
        (_, Value::Null) => {}
        (Value::Object(current), Value::Object(update)) => {
            for (key, value) in update {
                current.insert(key, value);
            }
        }
        (Value::Array(current), Value::Array(update)) => {
            for (idx, value) in update.into_iter().enumerate() {
                match current.get_mut(idx) {
                    Some(slot) => *slot = value,
                    None => current.push(value),
                }
            }
        }
        // Kind changed (e.g. object -> array): nothing sensible to merge.
        (current, update) => *current = update,
    }
}

/// Derive the visible snapshot from committed data.
///
/// Calculated properties are evaluated on every call and replace the raw
/// value; calculated fields of object values are substituted one level deep.
/// `data` is only read.
pub fn project(data: &StateMap, schema: Option<&Schema>) -> StateMap {
    let mut state = data.clone();
    let Some(schema) = schema else {
        return state;
    };

    for (key, value) in state.iter_mut() {
        let Some(spec) = schema.get(key) else {
            continue;
        };
        if let Some(calc) = spec.calculated() {
            *value = calc(data);
        }
        if let Value::Object(fields) = value {
            for (field, sub) in spec.fields() {
                if let Some(calc) = sub.calculated() {
                    fields.insert(field.to_string(), calc(data));
                }
            }
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertySpec;
    use proptest::prelude::*;
    use serde_json::json;

    fn list_schema() -> Schema {
        Schema::from_value(&json!({
            "list": {"default": []},
            "user": {"default": {"name": "anon"}, "role": {"default": "guest"}},
            "count": {"default": 0}
        }))
        .unwrap()
    }

    #[test]
    fn unknown_property_is_replaced_directly() {
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&list_schema()), "extra", json!({"a": 1}));
        merge_property(&mut data, Some(&list_schema()), "extra", json!({"b": 2}));
        assert_eq!(data["extra"], json!({"b": 2}));
    }

    #[test]
    fn seeding_uses_defaults_and_nested_defaults() {
        let schema = list_schema();
        let mut data = StateMap::new();
        for key in ["list", "user", "count"] {
            merge_property(&mut data, Some(&schema), key, Value::Null);
        }
        assert_eq!(data["list"], json!([]));
        assert_eq!(data["user"], json!({"name": "anon", "role": "guest"}));
        assert_eq!(data["count"], json!(0));
    }

    #[test]
    fn missing_default_seeds_empty_object() {
        let schema = Schema::new().with_property("prefs", PropertySpec::new());
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&schema), "prefs", Value::Null);
        assert_eq!(data["prefs"], json!({}));
    }

    #[test]
    fn object_updates_merge_instead_of_replacing() {
        let schema = list_schema();
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&schema), "user", json!({"name": "ada"}));
        merge_property(&mut data, Some(&schema), "user", json!({"email": "ada@example.com"}));
        assert_eq!(
            data["user"],
            json!({"name": "ada", "role": "guest", "email": "ada@example.com"})
        );
    }

    #[test]
    fn array_updates_merge_by_index() {
        let schema = list_schema();
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&schema), "list", json!(["a", "b"]));
        merge_property(&mut data, Some(&schema), "list", json!(["z"]));
        assert_eq!(data["list"], json!(["z", "b"]));
        merge_property(&mut data, Some(&schema), "list", json!(["z", "b", "c"]));
        assert_eq!(data["list"], json!(["z", "b", "c"]));
    }

    #[test]
    fn scalars_are_replaced_unless_update_is_null() {
        let schema = list_schema();
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&schema), "count", json!(7));
        assert_eq!(data["count"], json!(7));
        merge_property(&mut data, Some(&schema), "count", Value::Null);
        assert_eq!(data["count"], json!(7));
    }

    #[test]
    fn calculated_overrides_raw_value() {
        let schema = Schema::new().with_property(
            "count",
            PropertySpec::new()
                .with_default(json!(0))
                .with_calculated(|_| json!(42)),
        );
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&schema), "count", json!(5));

        let state = project(&data, Some(&schema));
        assert_eq!(state["count"], json!(42));
        assert_eq!(data["count"], json!(5));
    }

    #[test]
    fn calculated_fields_apply_one_level_deep() {
        let schema = Schema::new().with_property(
            "cart",
            PropertySpec::new()
                .with_default(json!({"items": [1, 2, 3]}))
                .with_field(
                    "total",
                    PropertySpec::new().with_calculated(|data| {
                        let n = data["cart"]["items"].as_array().map_or(0, Vec::len);
                        json!(n)
                    }),
                ),
        );
        let mut data = StateMap::new();
        merge_property(&mut data, Some(&schema), "cart", Value::Null);

        let state = project(&data, Some(&schema));
        assert_eq!(state["cart"]["total"], json!(3));
        assert!(data["cart"].get("total").is_none());
    }

    #[test]
    fn project_without_schema_is_a_copy() {
        let mut data = StateMap::new();
        data.insert("a".into(), json!(1));
        assert_eq!(project(&data, None), data);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: merging an object never drops keys the update doesn't name.
        #[test]
        fn object_merge_preserves_unmentioned_keys(
            first in prop::collection::btree_map("[a-e]", 0i64..100, 0..5),
            second in prop::collection::btree_map("[c-h]", 0i64..100, 0..5),
        ) {
            let schema = Schema::new().with_property("obj", PropertySpec::new());
            let mut data = StateMap::new();
            merge_property(&mut data, Some(&schema), "obj", json!(first));
            merge_property(&mut data, Some(&schema), "obj", json!(second));

            let merged = data["obj"].as_object().unwrap();
            for (key, value) in &first {
                if !second.contains_key(key) {
                    prop_assert_eq!(&merged[key], &json!(value));
                }
            }
            for (key, value) in &second {
                prop_assert_eq!(&merged[key], &json!(value));
            }
        }

        /// Property: projection is idempotent and never touches the raw data.
        #[test]
        fn projection_is_side_effect_free(values in prop::collection::vec(0i64..1000, 0..8)) {
            let schema = Schema::new()
                .with_property("list", PropertySpec::new().with_default(json!([])))
                .with_property("size", PropertySpec::new().with_calculated(|data| {
                    json!(data["list"].as_array().map_or(0, Vec::len))
                }));
            let mut data = StateMap::new();
            merge_property(&mut data, Some(&schema), "list", json!(values));
            merge_property(&mut data, Some(&schema), "size", json!(0));
            let before = data.clone();

            let first = project(&data, Some(&schema));
            let second = project(&data, Some(&schema));
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&data, &before);
            prop_assert_eq!(&first["size"], &json!(values.len()));
        }
    }
}
