//! In-memory snapshot of the lookup collections.
//!
//! Every snapshot is replaced wholesale; readers hold an `Arc` to the version
//! they looked at, so a refresh never mutates data under a reader.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Collections;
use crate::models::{Faculty, Parent, Section, Student};
use crate::store::{DocumentStore, list_all};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Faculty,
    Section,
    Student,
    Parent,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::Faculty,
        CollectionKind::Section,
        CollectionKind::Student,
        CollectionKind::Parent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Faculty => "faculty",
            CollectionKind::Section => "section",
            CollectionKind::Student => "student",
            CollectionKind::Parent => "parent",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "faculty" | "faculties" => Ok(CollectionKind::Faculty),
            "section" | "sections" => Ok(CollectionKind::Section),
            "student" | "students" => Ok(CollectionKind::Student),
            "parent" | "parents" => Ok(CollectionKind::Parent),
            _ => Err(format!("Unknown collection kind: {}", value)),
        }
    }
}

type Snapshot<T> = RwLock<Arc<Vec<T>>>;

pub struct LookupCache {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
    faculties: Snapshot<Faculty>,
    sections: Snapshot<Section>,
    students: Snapshot<Student>,
    parents: Snapshot<Parent>,
}

impl LookupCache {
    pub fn new(store: Arc<dyn DocumentStore>, collections: Collections) -> Self {
        Self {
            store,
            collections,
            faculties: RwLock::default(),
            sections: RwLock::default(),
            students: RwLock::default(),
            parents: RwLock::default(),
        }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Fetches one collection and swaps in the new snapshot. On failure the
    /// previous snapshot is kept.
    pub async fn refresh(&self, kind: CollectionKind) -> Result<usize> {
        let result = match kind {
            CollectionKind::Faculty => {
                let items = self.fetch::<Faculty>(&self.collections.faculty).await;
                items.map(|items| replace(&self.faculties, items))
            }
            CollectionKind::Section => {
                let items = self.fetch::<Section>(&self.collections.section).await;
                items.map(|items| replace(&self.sections, items))
            }
            CollectionKind::Student => {
                let items = self.fetch::<Student>(&self.collections.student).await;
                items.map(|items| replace(&self.students, items))
            }
            CollectionKind::Parent => {
                let items = self.fetch::<Parent>(&self.collections.parent).await;
                items.map(|items| replace(&self.parents, items))
            }
        };

        match &result {
            Ok(count) => tracing::debug!(kind = %kind, count, "Lookup cache refreshed"),
            Err(e) => tracing::error!(kind = %kind, "Failed to refresh lookup cache: {:#}", e),
        }
        result
    }

    /// Refreshes every kind; each kind succeeds or fails on its own.
    pub async fn refresh_all(&self) -> Vec<(CollectionKind, Result<usize>)> {
        let mut results = Vec::with_capacity(CollectionKind::ALL.len());
        for kind in CollectionKind::ALL {
            results.push((kind, self.refresh(kind).await));
        }
        results
    }

    async fn fetch<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let documents = list_all(self.store.as_ref(), collection, &[]).await?;
        let mut items = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.id.clone();
            match document.into_model::<T>() {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(collection, id = %id, "Skipping malformed document: {:#}", e),
            }
        }
        Ok(items)
    }

    pub fn faculties(&self) -> Arc<Vec<Faculty>> {
        read(&self.faculties)
    }

    pub fn sections(&self) -> Arc<Vec<Section>> {
        read(&self.sections)
    }

    pub fn students(&self) -> Arc<Vec<Student>> {
        read(&self.students)
    }

    pub fn parents(&self) -> Arc<Vec<Parent>> {
        read(&self.parents)
    }

    pub fn find_faculty_by_name(&self, name: &str) -> Option<Faculty> {
        let wanted = name.trim();
        self.faculties()
            .iter()
            .find(|faculty| faculty.name.trim().eq_ignore_ascii_case(wanted))
            .cloned()
    }

    pub fn find_faculty_by_id(&self, id: &str) -> Option<Faculty> {
        self.faculties().iter().find(|faculty| faculty.id == id).cloned()
    }

    pub fn find_section(&self, faculty_id: &str, class_name: &str, name: &str) -> Option<Section> {
        let wanted = name.trim();
        self.sections()
            .iter()
            .find(|section| {
                section.faculty_id == faculty_id
                    && section.class.trim().eq_ignore_ascii_case(class_name.trim())
                    && section.name.trim().eq_ignore_ascii_case(wanted)
            })
            .cloned()
    }

    pub fn find_parent_by_email(&self, email: &str) -> Option<Parent> {
        let wanted = email.trim();
        self.parents()
            .iter()
            .find(|parent| parent.email.trim().eq_ignore_ascii_case(wanted))
            .cloned()
    }

    /// Adds or replaces one parent in the snapshot.
    pub fn record_parent(&self, parent: Parent) {
        upsert(&self.parents, parent, |a, b| a.id == b.id);
    }

    /// Adds or replaces one student in the snapshot.
    pub fn record_student(&self, student: Student) {
        upsert(&self.students, student, |a, b| a.id == b.id);
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, faculties: Vec<Faculty>, sections: Vec<Section>, parents: Vec<Parent>) {
        replace(&self.faculties, faculties);
        replace(&self.sections, sections);
        replace(&self.parents, parents);
    }
}

fn read<T>(snapshot: &Snapshot<T>) -> Arc<Vec<T>> {
    snapshot
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn replace<T>(snapshot: &Snapshot<T>, items: Vec<T>) -> usize {
    let count = items.len();
    *snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(items);
    count
}

fn upsert<T: Clone>(snapshot: &Snapshot<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    let mut guard = snapshot.write().unwrap_or_else(PoisonError::into_inner);
    let mut items: Vec<T> = guard.as_ref().clone();
    match items.iter_mut().find(|existing| same(existing, &item)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
    *guard = Arc::new(items);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    async fn seeded_store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .create("faculty", "f1", json!({ "name": "Science", "classes": ["10", "11"] }))
            .await
            .unwrap();
        store
            .create(
                "section",
                "sec-a",
                json!({ "name": "A", "class": "10", "facultyId": "f1", "subjects": ["Physics"] }),
            )
            .await
            .unwrap();
        store
            .create(
                "parent",
                "p1",
                json!({ "name": "Jane", "email": "Jane@X.com", "contact": [], "students": [] }),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn refresh_twice_yields_identical_snapshot() {
        let store = seeded_store().await;
        let cache = LookupCache::new(store, Collections::default());

        for kind in CollectionKind::ALL {
            cache.refresh(kind).await.unwrap();
        }
        let first = (cache.faculties(), cache.sections(), cache.parents(), cache.students());

        for kind in CollectionKind::ALL {
            cache.refresh(kind).await.unwrap();
        }
        let second = (cache.faculties(), cache.sections(), cache.parents(), cache.students());

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
        assert_eq!(first.2, second.2);
        assert_eq!(first.3, second.3);
        assert_eq!(second.0.len(), 1);
    }

    #[tokio::test]
    async fn lookups_are_case_insensitive() {
        let store = seeded_store().await;
        let cache = LookupCache::new(store, Collections::default());
        cache.refresh_all().await;

        assert_eq!(cache.find_faculty_by_name("science").unwrap().id, "f1");
        assert_eq!(cache.find_section("f1", "10", "a").unwrap().id, "sec-a");
        assert!(cache.find_section("f1", "11", "a").is_none());
        assert_eq!(cache.find_parent_by_email("jane@x.com").unwrap().id, "p1");
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn list(&self, _: &str, _: &[crate::store::Query]) -> Result<Vec<crate::store::Document>> {
            Err(anyhow::anyhow!("backend unavailable"))
        }
        async fn get(&self, _: &str, _: &str) -> Result<Option<crate::store::Document>> {
            Err(anyhow::anyhow!("backend unavailable"))
        }
        async fn create(&self, _: &str, _: &str, _: Value) -> Result<crate::store::Document> {
            Err(anyhow::anyhow!("backend unavailable"))
        }
        async fn update(&self, _: &str, _: &str, _: Value) -> Result<crate::store::Document> {
            Err(anyhow::anyhow!("backend unavailable"))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<()> {
            Err(anyhow::anyhow!("backend unavailable"))
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let cache = LookupCache::new(Arc::new(FailingStore), Collections::default());
        let faculty = Faculty {
            id: "f1".into(),
            name: "Science".into(),
            classes: vec!["10".into()],
        };
        cache.seed(vec![faculty.clone()], vec![], vec![]);

        assert!(cache.refresh(CollectionKind::Faculty).await.is_err());
        assert_eq!(cache.faculties().as_ref(), &vec![faculty]);
    }

    #[test]
    fn record_parent_replaces_by_id() {
        let cache = LookupCache::new(Arc::new(FailingStore), Collections::default());
        let mut parent = Parent {
            id: "p1".into(),
            name: "Jane".into(),
            email: "jane@x.com".into(),
            contact: vec![],
            students: vec![],
        };
        cache.record_parent(parent.clone());
        parent.students.push("s1".into());
        cache.record_parent(parent);

        let parents = cache.parents();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].students, vec!["s1".to_string()]);
    }

    #[test]
    fn kind_parses_plural_names() {
        assert_eq!("Faculties".parse::<CollectionKind>(), Ok(CollectionKind::Faculty));
        assert!("buildings".parse::<CollectionKind>().is_err());
    }
}
