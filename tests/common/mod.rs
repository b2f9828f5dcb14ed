#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};

use school_admin::cache::LookupCache;
use school_admin::config::Collections;
use school_admin::identity::LocalIdentityService;
use school_admin::import::{CommitOrchestrator, ValidatedRow, suggest_mapping, validate};
use school_admin::store::{Document, DocumentStore, InMemoryDocumentStore, Query};

pub const HEADERS: [&str; 7] = [
    "Student Name",
    "Class",
    "Faculty",
    "Section",
    "Parent Name",
    "Parent Email",
    "Contact",
];

/// Store wrapper that can be told to fail specific writes.
pub struct FlakyStore {
    pub inner: InMemoryDocumentStore,
    pub fail_student_named: Option<String>,
    pub fail_parent_updates: AtomicBool,
    /// Fails updates of this one parent only.
    pub fail_update_of: Option<String>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            fail_student_named: None,
            fail_parent_updates: AtomicBool::new(false),
            fail_update_of: None,
        }
    }

    pub fn failing_student(name: &str) -> Self {
        Self {
            fail_student_named: Some(name.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>> {
        self.inner.list(collection, queries).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        if collection == "student" {
            if let Some(name) = &self.fail_student_named {
                if data.get("name") == Some(&json!(name)) {
                    return Err(anyhow!("connection reset"));
                }
            }
        }
        self.inner.create(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        if collection == "parent"
            && (self.fail_parent_updates.load(Ordering::SeqCst)
                || self.fail_update_of.as_deref() == Some(id))
        {
            return Err(anyhow!("write quota exceeded"));
        }
        self.inner.update(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }
}

pub async fn seed_school(store: &dyn DocumentStore) {
    store
        .create("faculty", "fac-sci", json!({ "name": "Science", "classes": ["10", "11"] }))
        .await
        .unwrap();
    store
        .create(
            "section",
            "sec-a",
            json!({ "name": "A", "class": "10", "facultyId": "fac-sci", "subjects": ["Math"] }),
        )
        .await
        .unwrap();
    store
        .create(
            "parent",
            "parent-1",
            json!({ "name": "Jane", "email": "alice-p@x.com", "contact": ["9800000000"], "students": [] }),
        )
        .await
        .unwrap();
}

pub struct Harness {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<LookupCache>,
    pub orchestrator: CommitOrchestrator,
}

pub async fn harness(store: Arc<dyn DocumentStore>) -> Harness {
    seed_school(store.as_ref()).await;
    let cache = Arc::new(LookupCache::new(store.clone(), Collections::default()));
    for (kind, result) in cache.refresh_all().await {
        assert!(result.is_ok(), "refresh {} failed", kind);
    }
    let identity = Arc::new(LocalIdentityService::new(store.clone(), "users", "school.edu").with_hash_cost(4));
    let orchestrator = CommitOrchestrator::new(store.clone(), identity, cache.clone());
    Harness {
        store,
        cache,
        orchestrator,
    }
}

/// A spreadsheet row in `HEADERS` order for a Science class 10 student.
pub fn sheet_row(student: &str, parent: &str, parent_email: &str) -> Vec<Value> {
    vec![
        json!(student),
        json!(10),
        json!("Science"),
        json!("A"),
        json!(parent),
        json!(parent_email),
        json!("9811111111"),
    ]
}

pub fn validated(cache: &LookupCache, rows: Vec<Vec<Value>>) -> Vec<ValidatedRow> {
    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let report = validate(&rows, &headers, &suggest_mapping(&headers), cache).unwrap();
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    report.valid
}

pub async fn count(store: &dyn DocumentStore, collection: &str) -> usize {
    school_admin::store::list_all(store, collection, &[])
        .await
        .unwrap()
        .len()
}
