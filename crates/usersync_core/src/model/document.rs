//! Flat document mapping used for exports, imports and remote snapshots.

use serde_json::{Map, Value};

/// Flat mapping from document key to serialized value.
///
/// The same shape is used for a property's export contribution, the merged
/// export snapshot, the remote per-user document and local slot payloads.
pub type DocumentMap = Map<String, Value>;

/// Merges `contribution` into `target`.
///
/// Returns the keys that were already present in `target`. Registries own
/// disjoint keys, so a non-empty result means a misconfigured property set.
pub fn merge_into(target: &mut DocumentMap, contribution: DocumentMap) -> Vec<String> {
    let mut collisions = Vec::new();
    for (key, value) in contribution {
        if target.contains_key(key.as_str()) {
            collisions.push(key.clone());
        }
        target.insert(key, value);
    }
    collisions
}

/// Returns whether every value in `document` is JSON `null` (or there are none).
pub fn is_blank(document: &DocumentMap) -> bool {
    document.values().all(Value::is_null)
}
