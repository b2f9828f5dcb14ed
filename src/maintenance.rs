//! Repairs parent → student back-references left incomplete by failed
//! link-back steps.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::config::Collections;
use crate::models::{Parent, Student};
use crate::store::{Document, DocumentStore, list_all};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub scanned_students: usize,
    pub repaired_parents: usize,
    pub linked_students: usize,
    /// Students whose `parentId` matches no parent.
    pub orphaned_students: Vec<String>,
    /// Parents whose update failed; the run carries on past them.
    pub failed_parents: Vec<ReconcileFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileFailure {
    pub parent_id: String,
    pub message: String,
}

pub async fn reconcile_parent_links(
    store: &dyn DocumentStore,
    collections: &Collections,
) -> Result<ReconcileReport> {
    let students: Vec<Student> = decode_all(
        list_all(store, &collections.student, &[])
            .await
            .context("Failed to list students")?,
    );
    let parents: HashMap<String, Parent> = decode_all::<Parent>(
        list_all(store, &collections.parent, &[])
            .await
            .context("Failed to list parents")?,
    )
    .into_iter()
    .map(|parent| (parent.id.clone(), parent))
    .collect();

    let mut report = ReconcileReport {
        scanned_students: students.len(),
        ..Default::default()
    };

    // BTreeMap keeps the update order stable between runs.
    let mut missing: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for student in &students {
        match parents.get(&student.parent_id) {
            None => report.orphaned_students.push(student.id.clone()),
            Some(parent) if !parent.students.contains(&student.id) => {
                missing.entry(parent.id.as_str()).or_default().push(student.id.clone());
            }
            Some(_) => {}
        }
    }

    for (parent_id, student_ids) in missing {
        let Some(parent) = parents.get(parent_id) else {
            continue;
        };
        let mut linked = parent.students.clone();
        for id in &student_ids {
            if !linked.contains(id) {
                linked.push(id.clone());
            }
        }
        if let Err(e) = store
            .update(&collections.parent, parent_id, json!({ "students": linked }))
            .await
        {
            tracing::error!(parent_id, "Failed to repair parent links: {:#}", e);
            report.failed_parents.push(ReconcileFailure {
                parent_id: parent_id.to_string(),
                message: format!("{:#}", e),
            });
            continue;
        }

        tracing::info!(parent_id, added = student_ids.len(), "Repaired parent links");
        report.repaired_parents += 1;
        report.linked_students += student_ids.len();
    }

    if !report.orphaned_students.is_empty() {
        tracing::warn!(
            count = report.orphaned_students.len(),
            "Students reference parents that do not exist"
        );
    }
    Ok(report)
}

fn decode_all<T: serde::de::DeserializeOwned>(documents: Vec<Document>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.id.clone();
            match document.into_model() {
                Ok(model) => Some(model),
                Err(e) => {
                    tracing::warn!(document_id = %id, "Skipping malformed document: {:#}", e);
                    None
                }
            }
        })
        .collect()
}
