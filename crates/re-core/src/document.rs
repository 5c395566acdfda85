//! # Documents
//!
//! The store holds untyped field maps. Records cross that boundary only
//! through these helpers, so required fields are enforced on the way in and
//! absent optionals never reach the store as nulls.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// A stored document: a map of top-level fields.
pub type Document = Map<String, Value>;

/// One `(key, document)` pair of a collection, as returned by queries.
pub type Entry = (String, Document);

/// Serializes a record into a document, dropping null fields.
pub fn to_document<T: Serialize>(record: &T) -> Result<Document> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(strip_nulls(map)),
        Ok(other) => Err(AppError::MalformedDocument(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(AppError::MalformedDocument(e.to_string())),
    }
}

/// Decodes the document stored under `key`. The key always wins over any
/// `id` field inside the body.
pub fn from_document<T: DeserializeOwned>(key: &str, mut doc: Document) -> Result<T> {
    doc.insert("id".to_string(), Value::String(key.to_string()));
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| AppError::MalformedDocument(format!("{key}: {e}")))
}

/// Decodes every entry, skipping (and logging) the ones that do not fit `T`.
pub fn decode_all<T: DeserializeOwned>(entries: Vec<Entry>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|(key, doc)| match from_document(&key, doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

pub fn strip_nulls(map: Document) -> Document {
    map.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

/// Shallow merge used by `update`: each top-level field of `patch` replaces
/// the target's, and a null removes it.
pub fn merge(target: &mut Document, patch: Document) {
    for (field, value) in patch {
        if value.is_null() {
            target.remove(&field);
        } else {
            target.insert(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use serde_json::json;

    #[test]
    fn optional_fields_are_not_written() {
        let rating = Rating {
            id: "r1".into(),
            item_id: "42".into(),
            rating: 3,
            review: None,
            user_id: "u1".into(),
            timestamp: chrono::Utc::now(),
            user_name: Some("Ann".into()),
            user_email: None,
        };
        let doc = to_document(&rating).unwrap();
        assert!(!doc.contains_key("review"));
        assert!(!doc.contains_key("userEmail"));
        assert_eq!(doc["userName"], json!("Ann"));
        assert_eq!(doc["itemId"], json!("42"));
    }

    #[test]
    fn key_overrides_embedded_id() {
        let doc = json!({
            "id": "stale",
            "itemId": "42",
            "rating": 5,
            "userId": "u1",
            "timestamp": 1_700_000_000_000_i64,
        });
        let Value::Object(doc) = doc else { unreachable!() };
        let rating: Rating = from_document("fresh", doc).unwrap();
        assert_eq!(rating.id, "fresh");
        assert_eq!(rating.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let Value::Object(doc) = json!({ "itemId": "42", "rating": 5 }) else { unreachable!() };
        let err = from_document::<Rating>("r1", doc).unwrap_err();
        assert!(matches!(err, AppError::MalformedDocument(_)));

        let Value::Object(bad) = json!({ "itemId": "1" }) else { unreachable!() };
        let Value::Object(good) = json!({
            "itemId": "1", "rating": 2, "userId": "u", "timestamp": 0
        }) else { unreachable!() };
        let decoded: Vec<Rating> = decode_all(vec![("a".into(), bad), ("b".into(), good)]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "b");
    }

    #[test]
    fn merge_replaces_and_removes_fields() {
        let Value::Object(mut target) = json!({ "a": 1, "b": 2 }) else { unreachable!() };
        let Value::Object(patch) = json!({ "a": 10, "b": null, "c": "x" }) else { unreachable!() };
        merge(&mut target, patch);
        assert_eq!(Value::Object(target), json!({ "a": 10, "c": "x" }));
    }
}
