//! Document model shared by every store backend
//!
//! A document is a flat JSON object whose `id` field is its primary key.
//! Stores are driven through three small building blocks:
//!
//! - `filter.rs` - equality predicates (`Filter`)
//! - `update.rs` - `$set` / `$inc` / `$setOnInsert` mutations (`Update`)
//! - `store.rs` - the `DocumentStore` trait and its result types

mod filter;
mod store;
mod update;

pub use filter::Filter;
pub use store::{DocumentStore, FindAndModifyOptions, UpdateResult};
pub use update::Update;

use crate::core::{Result, StoreError};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Name of the primary-key field of every document.
pub const ID_FIELD: &str = "id";

pub type Document = Map<String, Value>;

/// Serialize a value into a document. Fails unless it serializes to an object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected a document, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Canonical key for a primary-key value; `7` and `"7"` stay distinct.
pub(crate) fn key_of(value: &Value) -> String {
    value.to_string()
}

/// Primary key of a document, if it has one.
pub(crate) fn document_key(document: &Document) -> Option<String> {
    document.get(ID_FIELD).map(key_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        value: i64,
    }

    #[test]
    fn test_struct_document_roundtrip() {
        let counter = Counter {
            id: "SEQ".into(),
            value: 3,
        };
        let doc = to_document(&counter).unwrap();
        assert_eq!(doc.get("value"), Some(&json!(3)));
        assert_eq!(from_document::<Counter>(doc).unwrap(), counter);
    }

    #[test]
    fn test_scalar_is_not_a_document() {
        assert!(matches!(
            to_document(&5),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_keys_distinguish_types() {
        assert_ne!(key_of(&json!(7)), key_of(&json!("7")));
        assert_eq!(key_of(&json!(7i64)), key_of(&json!(7u32)));
    }
}
