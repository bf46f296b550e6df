//! Short-lived, server-side session storage.
//!
//! A session is a flat string-to-string record under an opaque key, written and
//! expired as a unit. Structured values are JSON-encoded on the way in; callers that
//! expect structure decode them on the way out with [`unflatten_value`].

mod memory;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{storage_error, Error, StorageErrorKind};

pub use memory::MemoryStore;

/// A flattened session record as returned by [`SessionStore::get_all`].
pub type Record = HashMap<String, String>;

/// Trait for TTL-backed session storage.
///
/// Implementations must make `put` atomic at the granularity of one record: every
/// field and the TTL are applied together, so a concurrent reader never observes a
/// partially written session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replace the record stored under `key` with `fields` and (re)set its TTL.
    ///
    /// # Arguments
    ///
    /// * `key` - Opaque record key
    /// * `fields` - Field values; non-string values are flattened with [`flatten_value`]
    /// * `ttl` - Lifetime of the record from now
    async fn put(&self, key: &str, fields: &Map<String, Value>, ttl: Duration)
        -> Result<(), Error>;

    /// Fetch every field of the record stored under `key`.
    ///
    /// Returns an empty record when the key never existed or has expired; the two
    /// cases are indistinguishable.
    async fn get_all(&self, key: &str) -> Result<Record, Error>;

    /// Remaining lifetime of the record, `None` when it does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error>;
}

/// Flatten one field value into its stored string form.
///
/// Strings are stored verbatim, numbers and booleans by their display form, and
/// anything else (objects, arrays, null) as JSON.
pub fn flatten_value(field: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => serde_json::to_string(other).map_err(|e| {
            storage_error(
                StorageErrorKind::Serialization,
                &format!("failed to encode field {field}: {e}"),
            )
        }),
    }
}

/// Flatten a whole field map; see [`flatten_value`].
pub fn flatten_fields(fields: &Map<String, Value>) -> Result<Vec<(String, String)>, Error> {
    fields
        .iter()
        .map(|(field, value)| Ok((field.clone(), flatten_value(field, value)?)))
        .collect()
}

/// Recover a field value written by [`flatten_value`].
///
/// JSON objects and arrays are decoded back into structure; every other value comes
/// back as a string because the store does not record the original primitive type.
pub fn unflatten_value(stored: &str) -> Value {
    let trimmed = stored.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(stored) {
            return value;
        }
    }
    Value::String(stored.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_primitives() {
        assert_eq!(flatten_value("a", &json!("text")).unwrap(), "text");
        assert_eq!(flatten_value("a", &json!(42)).unwrap(), "42");
        assert_eq!(flatten_value("a", &json!(1.5)).unwrap(), "1.5");
        assert_eq!(flatten_value("a", &json!(true)).unwrap(), "true");
    }

    #[test]
    fn test_flatten_structured_values_as_json() {
        let address = json!({"region": "Addis Ababa", "zone": "Bole"});
        let flat = flatten_value("address", &address).unwrap();
        let decoded: Value = serde_json::from_str(&flat).unwrap();
        assert_eq!(decoded, address);
        assert_eq!(flatten_value("x", &Value::Null).unwrap(), "null");
    }

    #[test]
    fn test_unflatten_restores_structure_only() {
        assert_eq!(
            unflatten_value(r#"{"zone":"Bole"}"#),
            json!({"zone": "Bole"})
        );
        assert_eq!(unflatten_value("[1,2]"), json!([1, 2]));
        assert_eq!(unflatten_value("42"), json!("42"));
        assert_eq!(unflatten_value("{not json"), json!("{not json"));
    }

    #[test]
    fn test_flatten_fields_keeps_every_field() {
        let mut fields = Map::new();
        fields.insert("sub".to_string(), json!("fayda-123"));
        fields.insert("age".to_string(), json!(30));
        let flat: Record = flatten_fields(&fields).unwrap().into_iter().collect();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["sub"], "fayda-123");
        assert_eq!(flat["age"], "30");
    }
}
