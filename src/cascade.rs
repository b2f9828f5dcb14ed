//! Dependent selection chain (faculty → class → section → subject).
//!
//! Changing a level clears every level below it, then loads the candidates
//! of the next level in the background. A background load only lands if the
//! level it fills has not been reset again in the meantime.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::config::Collections;
use crate::models::{Faculty, Section};
use crate::store::{DocumentStore, Query, list_all};

pub const FACULTY_LEVEL: &str = "facultyId";
pub const CLASS_LEVEL: &str = "className";
pub const SECTION_LEVEL: &str = "sectionId";
pub const SUBJECT_LEVEL: &str = "subjectName";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("unknown selection level: {0}")]
    UnknownLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Candidate {
    pub value: String,
    pub label: String,
}

impl Candidate {
    pub fn plain(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: value.to_string(),
        }
    }
}

/// The values chosen so far, in level order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    values: Vec<(String, Option<String>)>,
}

impl Selection {
    pub fn get(&self, level: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == level)
            .and_then(|(_, value)| value.as_deref())
    }
}

/// Loads the options of one level from the levels above it.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates(&self, selection: &Selection) -> Result<Vec<Candidate>>;
}

pub struct Level {
    pub name: String,
    pub source: Arc<dyn CandidateSource>,
}

impl Level {
    pub fn new(name: &str, source: Arc<dyn CandidateSource>) -> Self {
        Self {
            name: name.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LevelState {
    value: Option<String>,
    candidates: Vec<Candidate>,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelSnapshot {
    pub name: String,
    pub value: Option<String>,
    pub candidates: Vec<Candidate>,
}

pub struct CascadingSelector {
    names: Vec<String>,
    sources: Vec<Arc<dyn CandidateSource>>,
    state: Arc<Mutex<Vec<LevelState>>>,
    changes: watch::Sender<u64>,
}

impl CascadingSelector {
    pub fn new(levels: Vec<Level>) -> Self {
        let (names, sources): (Vec<_>, Vec<_>) =
            levels.into_iter().map(|level| (level.name, level.source)).unzip();
        let state = vec![LevelState::default(); names.len()];
        let (changes, _) = watch::channel(0);
        Self {
            names,
            sources,
            state: Arc::new(Mutex::new(state)),
            changes,
        }
    }

    pub fn level_names(&self) -> &[String] {
        &self.names
    }

    fn index_of(&self, level: &str) -> Result<usize, SelectorError> {
        self.names
            .iter()
            .position(|name| name == level)
            .ok_or_else(|| SelectorError::UnknownLevel(level.to_string()))
    }

    /// Loads the first level's options. Must run inside a tokio runtime.
    pub fn load_root(&self) -> Option<JoinHandle<()>> {
        if self.names.is_empty() {
            return None;
        }
        let generation = self.lock()[0].generation;
        Some(self.spawn_fetch(0, generation, Selection::default()))
    }

    /// Assigns `value` to `level`, clears every level below it and starts
    /// loading the next level's options. Returns immediately; the handle may
    /// be awaited or dropped. Must run inside a tokio runtime.
    pub fn set_level(
        &self,
        level: &str,
        value: Option<String>,
    ) -> Result<Option<JoinHandle<()>>, SelectorError> {
        let index = self.index_of(level)?;
        let value = value.filter(|v| !v.trim().is_empty());

        let (selection, next_generation) = {
            let mut state = self.lock();
            state[index].value = value.clone();
            for downstream in state.iter_mut().skip(index + 1) {
                downstream.value = None;
                downstream.candidates.clear();
                downstream.generation += 1;
            }
            let selection = self.selection_of(&state);
            let next_generation = state.get(index + 1).map(|next| next.generation);
            (selection, next_generation)
        };
        self.notify();

        match (value, next_generation) {
            (Some(_), Some(generation)) => {
                Ok(Some(self.spawn_fetch(index + 1, generation, selection)))
            }
            _ => Ok(None),
        }
    }

    fn spawn_fetch(&self, index: usize, generation: u64, selection: Selection) -> JoinHandle<()> {
        let source = Arc::clone(&self.sources[index]);
        let state = Arc::clone(&self.state);
        let changes = self.changes.clone();
        let name = self.names[index].clone();

        tokio::spawn(async move {
            let candidates = match source.candidates(&selection).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::error!(selection_level = %name, "Failed to load selection options: {:#}", e);
                    return;
                }
            };

            let applied = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                let slot = &mut state[index];
                if slot.generation == generation {
                    slot.candidates = candidates;
                    true
                } else {
                    false
                }
            };

            if applied {
                changes.send_modify(|version| *version += 1);
            } else {
                tracing::debug!(selection_level = %name, "Dropping options for a superseded selection");
            }
        })
    }

    pub fn value(&self, level: &str) -> Result<Option<String>, SelectorError> {
        let index = self.index_of(level)?;
        Ok(self.lock()[index].value.clone())
    }

    pub fn candidates(&self, level: &str) -> Result<Vec<Candidate>, SelectorError> {
        let index = self.index_of(level)?;
        Ok(self.lock()[index].candidates.clone())
    }

    pub fn selection(&self) -> Selection {
        self.selection_of(&self.lock())
    }

    pub fn snapshot(&self) -> Vec<LevelSnapshot> {
        let state = self.lock();
        self.names
            .iter()
            .zip(state.iter())
            .map(|(name, level)| LevelSnapshot {
                name: name.clone(),
                value: level.value.clone(),
                candidates: level.candidates.clone(),
            })
            .collect()
    }

    /// Receiver that ticks whenever a value or an option list changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn selection_of(&self, state: &[LevelState]) -> Selection {
        Selection {
            values: self
                .names
                .iter()
                .cloned()
                .zip(state.iter().map(|level| level.value.clone()))
                .collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LevelState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

struct FacultySource {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

#[async_trait]
impl CandidateSource for FacultySource {
    async fn candidates(&self, _selection: &Selection) -> Result<Vec<Candidate>> {
        let documents =
            list_all(self.store.as_ref(), &self.collection, &[Query::OrderAsc("name".into())])
                .await?;
        documents
            .into_iter()
            .map(|doc| {
                let faculty: Faculty = doc.into_model()?;
                Ok(Candidate {
                    value: faculty.id,
                    label: faculty.name,
                })
            })
            .collect()
    }
}

struct ClassSource {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

#[async_trait]
impl CandidateSource for ClassSource {
    async fn candidates(&self, selection: &Selection) -> Result<Vec<Candidate>> {
        let Some(faculty_id) = selection.get(FACULTY_LEVEL) else {
            return Ok(Vec::new());
        };
        let document = self
            .store
            .get(&self.collection, faculty_id)
            .await?
            .ok_or_else(|| anyhow!("Faculty {} not found", faculty_id))?;
        let faculty: Faculty = document.into_model()?;
        Ok(faculty.classes.iter().map(|class| Candidate::plain(class)).collect())
    }
}

struct SectionSource {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

#[async_trait]
impl CandidateSource for SectionSource {
    async fn candidates(&self, selection: &Selection) -> Result<Vec<Candidate>> {
        let (Some(faculty_id), Some(class_name)) =
            (selection.get(FACULTY_LEVEL), selection.get(CLASS_LEVEL))
        else {
            return Ok(Vec::new());
        };
        let documents = list_all(
            self.store.as_ref(),
            &self.collection,
            &[
                Query::equal("facultyId", faculty_id),
                Query::equal("class", class_name),
            ],
        )
        .await?;
        documents
            .into_iter()
            .map(|doc| {
                let section: Section = doc.into_model()?;
                Ok(Candidate {
                    value: section.id,
                    label: section.name,
                })
            })
            .collect()
    }
}

struct SubjectSource {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

#[async_trait]
impl CandidateSource for SubjectSource {
    async fn candidates(&self, selection: &Selection) -> Result<Vec<Candidate>> {
        let Some(section_id) = selection.get(SECTION_LEVEL) else {
            return Ok(Vec::new());
        };
        let document = self
            .store
            .get(&self.collection, section_id)
            .await?
            .ok_or_else(|| anyhow!("Section {} not found", section_id))?;
        let section: Section = document.into_model()?;
        Ok(section.subjects.iter().map(|subject| Candidate::plain(subject)).collect())
    }
}

/// The faculty → class → section → subject chain used by assignment, exam
/// and notification screens.
pub fn school_selector(store: Arc<dyn DocumentStore>, collections: &Collections) -> CascadingSelector {
    CascadingSelector::new(vec![
        Level::new(
            FACULTY_LEVEL,
            Arc::new(FacultySource {
                store: Arc::clone(&store),
                collection: collections.faculty.clone(),
            }),
        ),
        Level::new(
            CLASS_LEVEL,
            Arc::new(ClassSource {
                store: Arc::clone(&store),
                collection: collections.faculty.clone(),
            }),
        ),
        Level::new(
            SECTION_LEVEL,
            Arc::new(SectionSource {
                store: Arc::clone(&store),
                collection: collections.section.clone(),
            }),
        ),
        Level::new(
            SUBJECT_LEVEL,
            Arc::new(SubjectSource {
                store,
                collection: collections.section.clone(),
            }),
        ),
    ])
}
