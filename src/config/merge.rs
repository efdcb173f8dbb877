//! Layer merge logic
//!
//! Mappings merge key by key, recursively. Everything else (scalars,
//! sequences, null) is replaced wholesale by the overlay: a host file that
//! lists `directories` replaces the default list, it never extends it.

use serde_json::{Map, Value};

/// Deep merge `overlay` on top of `base`.
///
/// Both inputs are consumed; untouched subtrees of `base` are moved into the
/// result rather than cloned.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Value::Object(merge_maps(base_map, overlay_map))
        }
        (_, overlay) => overlay,
    }
}

fn merge_maps(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, overlay_value) in overlay {
        let merged = match base.remove(&key) {
            Some(base_value) => deep_merge(base_value, overlay_value),
            None => overlay_value,
        };
        base.insert(key, merged);
    }
    base
}

/// Merge layers in order; the last layer has the highest precedence.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    layers
        .into_iter()
        .fold(Value::Object(Map::new()), deep_merge)
}
