//! JSON helpers shared by the mock operations

use serde_json::{Map, Value};

/// Applies an RFC 7386 JSON merge patch to `target`.
///
/// `null` removes a key, objects merge recursively, anything else replaces.
pub(crate) fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Returns the patch with `metadata.resourceVersion` split off.
pub(crate) fn take_resource_version(patch: &Value) -> (Value, Option<String>) {
    let mut body = patch.clone();
    let rv = body
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .and_then(|m| m.remove("resourceVersion"))
        .and_then(|v| v.as_str().map(str::to_string));
    (body, rv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_rfc7386() {
        let mut target = json!({"a": "b", "c": {"d": "e", "f": "g"}});
        merge_patch(&mut target, &json!({"a": "z", "c": {"f": null}}));
        assert_eq!(target, json!({"a": "z", "c": {"d": "e"}}));
    }

    #[test]
    fn test_merge_patch_replaces_arrays() {
        let mut target = json!({"ports": [1, 2, 3]});
        merge_patch(&mut target, &json!({"ports": [4, 5, 6]}));
        assert_eq!(target, json!({"ports": [4, 5, 6]}));
    }

    #[test]
    fn test_merge_patch_creates_missing_objects() {
        let mut target = json!({"spec": {}});
        merge_patch(&mut target, &json!({"status": {"initialized": true}}));
        assert_eq!(target, json!({"spec": {}, "status": {"initialized": true}}));
    }

    #[test]
    fn test_take_resource_version() {
        let (body, rv) = take_resource_version(&json!({"spec": {"id": 1}, "metadata": {"resourceVersion": "9"}}));
        assert_eq!(rv.as_deref(), Some("9"));
        assert_eq!(body, json!({"spec": {"id": 1}, "metadata": {}}));
    }
}
