use serde_json::{Map, Value};
use uuid::Uuid;

/// merge
///
/// Shallow merge of two JSON objects: keys of `overrides` replace the ones in
/// `base`, keys only present in either side are kept.
pub fn merge(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// generate_hashid
///
/// A short, URL-safe external identifier.
pub fn generate_hashid() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// generate_authkey
///
/// An opaque bearer credential. Two v4 uuids give 244 random bits.
pub fn generate_authkey() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
