//! Deep merge of JSON values.
//!
//! Mappings merge key by key, recursing where both sides hold a mapping.
//! Every other pairing (scalars, arrays, null, or a mapping meeting a
//! non-mapping) is a wholesale replacement by the incoming value. Arrays
//! are never concatenated or merged element-wise.
//!
//! [`Value`] is a closed sum type, so the two match arms below cover every
//! case, and recursion only descends into strictly smaller values of the
//! incoming side.

use serde_json::Value;

/// Merge `incoming` into `target` in place.
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(update)) => {
            for (key, value) in update {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, replacement) => *slot = replacement,
    }
}

/// Return the merge of `incoming` over a copy of `base`.
pub fn merged(base: &Value, incoming: Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, incoming);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_mappings_merge_field_by_field() {
        let mut value = json!({"a": 1, "b": {"c": 1}});
        deep_merge(&mut value, json!({"b": {"d": 2}}));
        assert_eq!(value, json!({"a": 1, "b": {"c": 1, "d": 2}}));
    }

    #[test]
    fn arrays_are_replaced_wholesale() {
        let mut value = json!({"x": [1, 2]});
        deep_merge(&mut value, json!({"x": [3]}));
        assert_eq!(value, json!({"x": [3]}));
    }

    #[test]
    fn type_conflicts_take_incoming_value() {
        let mut value = json!({"a": {"nested": true}, "b": 5});
        deep_merge(&mut value, json!({"a": "flat", "b": {"now": "mapping"}}));
        assert_eq!(value, json!({"a": "flat", "b": {"now": "mapping"}}));
    }

    #[test]
    fn null_replaces_existing_value() {
        let mut value = json!({"a": {"b": 1}});
        deep_merge(&mut value, json!({"a": null}));
        assert_eq!(value, json!({"a": null}));
    }

    #[test]
    fn non_mapping_root_is_replaced() {
        let mut value = json!([1, 2, 3]);
        deep_merge(&mut value, json!({"k": "v"}));
        assert_eq!(value, json!({"k": "v"}));
    }

    #[test]
    fn sequential_merges_compose() {
        let first = json!({"Lines": {"44": {"Position": "1"}}});
        let second = json!({"Lines": {"44": {"GapToLeader": ""}, "1": {"Position": "2"}}});
        let third = json!({"Lines": {"44": {"Position": "2"}}});

        let mut stepwise = first.clone();
        deep_merge(&mut stepwise, second.clone());
        deep_merge(&mut stepwise, third.clone());

        let grouped = merged(&first, merged(&second, third));
        assert_eq!(stepwise, grouped);
        assert_eq!(stepwise["Lines"]["44"], json!({"Position": "2", "GapToLeader": ""}));
    }

    #[test]
    fn merged_leaves_base_untouched() {
        let base = json!({"a": 1});
        let out = merged(&base, json!({"b": 2}));
        assert_eq!(base, json!({"a": 1}));
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }
}
