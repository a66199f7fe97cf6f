use serde_json::{Map, Value};

/// Recursively merges `overrides` into `base`.
///
/// Nested mappings are merged key by key. Scalars and sequences in
/// `overrides` replace whatever `base` holds at the same key.
pub fn replace_recursive(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                replace_recursive(existing, nested);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Keeps only the entries of `map` whose key is listed in `allowed`.
pub fn intersect_keys(map: &Map<String, Value>, allowed: &[&str]) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
