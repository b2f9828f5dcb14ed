//! Document store abstraction over the backend collections.
//!
//! Documents are schema-less JSON objects addressed by `(collection, id)`.
//! On the wire the id travels inside the object as `$id`.

pub mod blob;
pub mod memory;
pub mod sea_orm_store;

use std::cmp::Ordering;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DEFAULT_PAGE_SIZE;

pub use blob::{BlobStore, LocalBlobStore, StoredFile};
pub use memory::InMemoryDocumentStore;
pub use sea_orm_store::SeaOrmDocumentStore;

pub const ID_FIELD: &str = "$id";

const LIST_ALL_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Reads a field, treating `$id` as the document id.
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.data.get(name).cloned()
    }

    /// Deserializes the document into a model, injecting `$id`.
    pub fn into_model<T: DeserializeOwned>(self) -> Result<T> {
        let mut object = match self.data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => anyhow::bail!("Document {} is not an object: {}", self.id, other),
        };
        object.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(object))
            .with_context(|| format!("Failed to decode document {}", self.id))
    }
}

/// Serializes a model into document data, stripping `$id`.
pub fn to_document_data<T: Serialize>(model: &T) -> Result<Value> {
    let mut value = serde_json::to_value(model).context("Failed to encode document")?;
    if let Value::Object(map) = &mut value {
        map.remove(ID_FIELD);
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Value),
    OrderAsc(String),
    OrderDesc(String),
    Limit(u64),
    Offset(u64),
}

impl Query {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Query::Equal(field.to_string(), value.into())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document>;

    /// Merges the top-level fields of `data` into the stored document.
    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<Document>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Pages through a collection until a short page comes back.
pub async fn list_all(
    store: &dyn DocumentStore,
    collection: &str,
    filters: &[Query],
) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut offset = 0u64;
    loop {
        let mut queries = filters.to_vec();
        queries.push(Query::Limit(LIST_ALL_PAGE_SIZE));
        queries.push(Query::Offset(offset));

        let page = store.list(collection, &queries).await?;
        let fetched = page.len() as u64;
        documents.extend(page);
        if fetched < LIST_ALL_PAGE_SIZE {
            return Ok(documents);
        }
        offset += fetched;
    }
}

/// Applies equality filters, ordering and pagination to an already loaded
/// collection. Documents keep their stored order unless an ordering is given.
pub(crate) fn apply_queries(mut documents: Vec<Document>, queries: &[Query]) -> Vec<Document> {
    let mut limit = DEFAULT_PAGE_SIZE;
    let mut offset = 0u64;

    for query in queries {
        match query {
            Query::Equal(field, expected) => {
                documents.retain(|doc| field_matches(doc.field(field).as_ref(), expected));
            }
            Query::OrderAsc(field) => {
                documents.sort_by(|a, b| compare_values(a.field(field), b.field(field)));
            }
            Query::OrderDesc(field) => {
                documents.sort_by(|a, b| compare_values(b.field(field), a.field(field)));
            }
            Query::Limit(n) => limit = *n,
            Query::Offset(n) => offset = *n,
        }
    }

    documents
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

pub(crate) fn merge_data(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(changes)) => {
            for (key, value) in changes {
                if key != ID_FIELD {
                    existing.insert(key, value);
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(value) => value == expected,
        None => expected.is_null(),
    }
}

fn compare_values(a: Option<Value>, b: Option<Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(&y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(&y),
        (None, Some(_)) | (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a", json!({ "name": "Science", "rank": 2, "classes": ["10", "11"] })),
            Document::new("b", json!({ "name": "Arts", "rank": 1, "classes": ["9"] })),
            Document::new("c", json!({ "name": "Commerce", "rank": 3, "classes": ["11"] })),
        ]
    }

    #[test]
    fn equal_on_array_field_matches_membership() {
        let found = apply_queries(docs(), &[Query::equal("classes", "11")]);
        let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn ordering_and_pagination() {
        let found = apply_queries(
            docs(),
            &[Query::OrderDesc("rank".into()), Query::Offset(1), Query::Limit(1)],
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn equal_on_id_field() {
        let found = apply_queries(docs(), &[Query::equal(ID_FIELD, "b")]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field("name"), Some(json!("Arts")));
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut data = json!({ "name": "Jane", "students": [] });
        merge_data(&mut data, json!({ "students": ["s1"], "$id": "ignored" }));
        assert_eq!(data, json!({ "name": "Jane", "students": ["s1"] }));
    }
}
