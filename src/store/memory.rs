use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, Query, apply_queries, merge_data};

/// Process-local document store. Collections keep insertion order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let documents = collections.get(collection).cloned().unwrap_or_default();
        Ok(apply_queries(documents, queries))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|doc| doc.id == id) {
            return Err(anyhow!("Document {} already exists in {}", id, collection));
        }
        let mut stored = Value::Object(Default::default());
        merge_data(&mut stored, data);
        let document = Document::new(id, stored);
        documents.push(document.clone());
        Ok(document)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| anyhow!("Document {} not found in {}", id, collection))?;
        merge_data(&mut document.data, data);
        Ok(document.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let documents = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("Document {} not found in {}", id, collection))?;
        let before = documents.len();
        documents.retain(|doc| doc.id != id);
        if documents.len() == before {
            return Err(anyhow!("Document {} not found in {}", id, collection));
        }
        Ok(())
    }
}
