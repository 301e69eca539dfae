//! # Merge Patch
//!
//! JSON merge patch (RFC 7386) generation. Used for both ManifestWork updates
//! and addon status writes so that only changed fields go over the wire.

use serde_json::{Map, Value};

/// Compute the merge patch that turns `old` into `new`.
///
/// Keys missing from `new` are removed with `null`. Arrays and scalars are
/// replaced wholesale.
#[must_use]
pub fn create_merge_patch(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut patch = Map::new();
            for (key, old_value) in old_map {
                match new_map.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(new_value) if new_value != old_value => {
                        patch.insert(key.clone(), create_merge_patch(old_value, new_value));
                    }
                    Some(_) => {}
                }
            }
            for (key, new_value) in new_map {
                if !old_map.contains_key(key) {
                    patch.insert(key.clone(), new_value.clone());
                }
            }
            Value::Object(patch)
        }
        _ => new.clone(),
    }
}

/// True when the patch carries no changes
#[must_use]
pub fn is_empty_patch(patch: &Value) -> bool {
    patch.as_object().is_some_and(Map::is_empty)
}
