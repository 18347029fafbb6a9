//! RFC 7396 merge patch over JSON values, used to layer config files.

use serde_json::Value;

/// Applies `patch` on top of `target`.
///
/// Objects merge key by key, `null` removes a key, anything else replaces.
pub fn merge_patch(target: Value, patch: Value) -> Value {
    let Value::Object(patch_map) = patch else {
        return patch;
    };
    let mut target_map = match target {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for (key, value) in patch_map {
        if value.is_null() {
            target_map.remove(&key);
        } else {
            let existing = target_map.remove(&key).unwrap_or(Value::Null);
            target_map.insert(key, merge_patch(existing, value));
        }
    }
    Value::Object(target_map)
}
