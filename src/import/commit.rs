//! Sequential write-out of validated rows.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::validator::{ValidatedRow, check_references};
use crate::cache::LookupCache;
use crate::identity::{IdentityService, SignupRequest};
use crate::models::{Parent, Student};
use crate::store::{DocumentStore, to_document_data};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitRowError {
    pub row_number: usize,
    pub message: String,
}

/// A row that was committed but whose parent back-reference could not be
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitWarning {
    pub row_number: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub total: usize,
    pub success_count: usize,
    pub errors: Vec<CommitRowError>,
    pub warnings: Vec<CommitWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitProgress {
    pub processed: usize,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
}

#[derive(Clone)]
pub struct CommitOrchestrator {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityService>,
    cache: Arc<LookupCache>,
}

struct CommittedRow {
    student_id: String,
    parent_id: String,
}

impl CommitOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityService>,
        cache: Arc<LookupCache>,
    ) -> Self {
        Self {
            store,
            identity,
            cache,
        }
    }

    pub async fn commit(&self, rows: &[ValidatedRow]) -> CommitReport {
        self.commit_with_progress(rows, |_| {}).await
    }

    /// Commits rows one at a time. A failing row is recorded and the loop
    /// moves on; nothing already written is rolled back.
    pub async fn commit_with_progress<F>(&self, rows: &[ValidatedRow], mut on_progress: F) -> CommitReport
    where
        F: FnMut(&CommitProgress) + Send,
    {
        let mut report = CommitReport {
            total: rows.len(),
            ..Default::default()
        };
        tracing::info!(total = rows.len(), "Starting student import commit");

        for (index, row) in rows.iter().enumerate() {
            match self.commit_row(row).await {
                Ok(committed) => {
                    report.success_count += 1;
                    if let Err(e) = self.link_student(&committed).await {
                        tracing::warn!(
                            row = row.row_number,
                            student_id = %committed.student_id,
                            parent_id = %committed.parent_id,
                            "Failed to link student to parent: {:#}",
                            e
                        );
                        report.warnings.push(CommitWarning {
                            row_number: row.row_number,
                            message: format!(
                                "Student '{}' was created but could not be linked to parent {}: {:#}",
                                row.student_data.name, committed.parent_id, e
                            ),
                        });
                    }
                }
                Err(e) => {
                    tracing::error!(row = row.row_number, "Failed to commit import row: {:#}", e);
                    report.errors.push(CommitRowError {
                        row_number: row.row_number,
                        message: format!("{:#}", e),
                    });
                }
            }

            on_progress(&CommitProgress {
                processed: index + 1,
                total: rows.len(),
                success_count: report.success_count,
                error_count: report.errors.len(),
            });
        }

        tracing::info!(
            total = report.total,
            success = report.success_count,
            failed = report.errors.len(),
            warnings = report.warnings.len(),
            "Finished student import commit"
        );
        report
    }

    async fn commit_row(&self, row: &ValidatedRow) -> Result<CommittedRow> {
        let student = &row.student_data;
        let parent_info = &row.parent_info;

        check_references(row, &self.cache)?;

        // Only the current cache decides; it may have gained this parent from
        // an earlier row in the batch.
        let existing_parent_id = self
            .cache
            .find_parent_by_email(&parent_info.email)
            .map(|parent| parent.id);

        let signup = self
            .identity
            .signup(SignupRequest {
                is_existing_parent: existing_parent_id.is_some(),
                student_name: student.name.clone(),
                parent_name: existing_parent_id.is_none().then(|| parent_info.name.clone()),
                parent_email: existing_parent_id.is_none().then(|| parent_info.email.clone()),
            })
            .await
            .with_context(|| format!("Failed to create login for '{}'", student.name))?;

        let parent_id = match existing_parent_id {
            Some(id) => id,
            None => {
                let parent_id = signup
                    .parent_user_id
                    .clone()
                    .ok_or_else(|| anyhow!("Identity service returned no parent id for '{}'", parent_info.email))?;
                let parent = Parent {
                    id: parent_id.clone(),
                    name: parent_info.name.clone(),
                    email: parent_info.email.clone(),
                    contact: parent_info.contact.clone(),
                    students: Vec::new(),
                };
                let collection = &self.cache.collections().parent;
                self.store
                    .create(collection, &parent.id, to_document_data(&parent)?)
                    .await
                    .with_context(|| format!("Failed to create parent '{}'", parent.email))?;
                self.cache.record_parent(parent);
                parent_id
            }
        };

        let record = Student {
            id: signup.student_user_id.clone(),
            name: student.name.clone(),
            class: student.class.clone(),
            faculty_id: student.faculty_id.clone(),
            section: student.section.clone(),
            parent_id: parent_id.clone(),
            email: signup.student_email.clone(),
            address: student.address.clone(),
            gender: student.gender.clone(),
            dob: student.dob.clone(),
        };
        let collection = &self.cache.collections().student;
        self.store
            .create(collection, &record.id, to_document_data(&record)?)
            .await
            .with_context(|| format!("Failed to create student '{}'", record.name))?;
        self.cache.record_student(record);

        Ok(CommittedRow {
            student_id: signup.student_user_id,
            parent_id,
        })
    }

    async fn link_student(&self, committed: &CommittedRow) -> Result<()> {
        let collection = &self.cache.collections().parent;
        let mut parent: Parent = self
            .store
            .get(collection, &committed.parent_id)
            .await?
            .ok_or_else(|| anyhow!("parent {} not found", committed.parent_id))?
            .into_model()?;

        if parent.students.contains(&committed.student_id) {
            return Ok(());
        }
        parent.students.push(committed.student_id.clone());
        self.store
            .update(collection, &parent.id, json!({ "students": parent.students }))
            .await?;
        self.cache.record_parent(parent);
        Ok(())
    }
}
