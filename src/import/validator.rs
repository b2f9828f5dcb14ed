//! Row validation against the lookup cache.
//!
//! Validation is a pure function of the rows, the mapping and the cache
//! snapshot; it performs no I/O.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::mapping::{ColumnMapping, ImportField, MappingError, resolve_columns};
use crate::cache::LookupCache;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid email regex"));

/// Spreadsheet row number of the first data row (the header is row 1).
const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentData {
    pub name: String,
    pub class: String,
    /// Resolved faculty `$id`.
    pub faculty_id: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParentInfo {
    pub name: String,
    pub email: String,
    pub contact: Vec<String>,
    /// Parent that already had this email when the row was validated.
    #[serde(default)]
    pub existing_parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedRow {
    pub row_number: usize,
    pub student_data: StudentData,
    pub parent_info: ParentInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: usize,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: Vec<ValidatedRow>,
    pub errors: Vec<RowError>,
    pub total_rows: usize,
    pub valid_count: usize,
    pub error_count: usize,
    pub skipped_empty: usize,
}

/// One non-empty data row with its mapped cell text.
#[derive(Debug)]
pub struct ImportRow<'a> {
    pub raw_cells: &'a [Value],
    pub row_number: usize,
    pub mapped_fields: BTreeMap<ImportField, String>,
}

pub fn validate(
    rows: &[Vec<Value>],
    headers: &[String],
    mapping: &ColumnMapping,
    cache: &LookupCache,
) -> Result<ValidationReport, MappingError> {
    let columns = resolve_columns(headers, mapping)?;

    let mut valid = Vec::new();
    let mut errors = Vec::new();
    let mut skipped_empty = 0;

    for (index, cells) in rows.iter().enumerate() {
        let row_number = index + FIRST_DATA_ROW;
        if cells.iter().all(|cell| cell_text(cell).is_none()) {
            skipped_empty += 1;
            continue;
        }

        let (row, mut messages) = extract(cells, row_number, &columns);
        match resolve(&row, cache, &mut messages) {
            Some(validated) if messages.is_empty() => valid.push(validated),
            _ => {
                let name = row
                    .mapped_fields
                    .get(&ImportField::StdName)
                    .map(String::as_str)
                    .unwrap_or("unknown");
                errors.push(RowError {
                    row: row_number,
                    messages: messages
                        .into_iter()
                        .map(|message| format!("Row {} ({}): {}", row_number, name, message))
                        .collect(),
                });
            }
        }
    }

    tracing::debug!(
        valid = valid.len(),
        invalid = errors.len(),
        skipped_empty,
        "Validated import rows"
    );

    Ok(ValidationReport {
        total_rows: rows.len(),
        valid_count: valid.len(),
        error_count: errors.len(),
        skipped_empty,
        valid,
        errors,
    })
}

/// Reads every mapped cell. Empty required cells and malformed values are
/// reported; only well-formed values land in `mapped_fields`.
fn extract<'a>(
    cells: &'a [Value],
    row_number: usize,
    columns: &[(usize, ImportField)],
) -> (ImportRow<'a>, Vec<String>) {
    let mut mapped_fields = BTreeMap::new();
    let mut messages = Vec::new();

    for (index, field) in columns {
        let Some(text) = cells.get(*index).and_then(cell_text) else {
            if field.is_required() {
                messages.push(format!("{} is required", field.label()));
            }
            continue;
        };

        match field {
            ImportField::ParentEmail if !EMAIL_RE.is_match(&text) => {
                messages.push(format!("Invalid parent email '{}'", text));
            }
            ImportField::ParentContact if split_contacts(&text).is_empty() => {
                messages.push(format!("{} is required", field.label()));
            }
            _ => {
                mapped_fields.insert(*field, text);
            }
        }
    }

    (
        ImportRow {
            raw_cells: cells,
            row_number,
            mapped_fields,
        },
        messages,
    )
}

/// Cross-references faculty, class and section, and looks up an existing
/// parent by email. Returns the resolved row when every lookup succeeded.
fn resolve(row: &ImportRow<'_>, cache: &LookupCache, messages: &mut Vec<String>) -> Option<ValidatedRow> {
    let fields = &row.mapped_fields;
    let faculty_name = fields.get(&ImportField::FacultyId);
    let class_name = fields.get(&ImportField::Class);
    let section_name = fields.get(&ImportField::Section);

    let mut resolved = None;
    if let Some(faculty_name) = faculty_name {
        match cache.find_faculty_by_name(faculty_name) {
            None => messages.push(format!("Faculty '{}' not found", faculty_name)),
            Some(faculty) => {
                if let Some(class_name) = class_name {
                    match faculty.find_class(class_name) {
                        None => messages.push(format!(
                            "Class '{}' does not exist in faculty '{}'",
                            class_name, faculty.name
                        )),
                        Some(class) => {
                            let class = class.to_string();
                            let section = match section_name {
                                None => Some(None),
                                Some(section_name) => {
                                    match cache.find_section(&faculty.id, &class, section_name) {
                                        Some(section) => Some(Some(section.name)),
                                        None => {
                                            messages.push(format!(
                                                "Section '{}' not found for class '{}' in faculty '{}'",
                                                section_name, class, faculty.name
                                            ));
                                            None
                                        }
                                    }
                                }
                            };
                            if let Some(section) = section {
                                resolved = Some((faculty.id.clone(), class, section));
                            }
                        }
                    }
                }
            }
        }
    }

    let existing_parent_id = fields
        .get(&ImportField::ParentEmail)
        .and_then(|email| cache.find_parent_by_email(email))
        .map(|parent| parent.id);

    let (faculty_id, class, section) = resolved?;
    let name = fields.get(&ImportField::StdName)?.clone();
    let parent_name = fields.get(&ImportField::ParentName)?.clone();
    let parent_email = fields.get(&ImportField::ParentEmail)?.clone();
    let contact = split_contacts(fields.get(&ImportField::ParentContact)?);

    Some(ValidatedRow {
        row_number: row.row_number,
        student_data: StudentData {
            name,
            class,
            faculty_id,
            section,
            address: fields.get(&ImportField::Address).cloned(),
            gender: fields.get(&ImportField::Gender).cloned(),
            dob: fields.get(&ImportField::Dob).cloned(),
        },
        parent_info: ParentInfo {
            name: parent_name,
            email: parent_email,
            contact,
            existing_parent_id,
        },
    })
}

/// Re-checks a row that may not come from [`validate`] (for example one
/// posted back by a client) against the current cache: faculty id, class,
/// section, required text and parent email.
pub fn check_references(row: &ValidatedRow, cache: &LookupCache) -> anyhow::Result<()> {
    let student = &row.student_data;
    let parent = &row.parent_info;

    let mut problems = Vec::new();
    for (field, value) in [
        (ImportField::StdName, &student.name),
        (ImportField::ParentName, &parent.name),
    ] {
        if value.trim().is_empty() {
            problems.push(format!("{} is required", field.label()));
        }
    }
    if !EMAIL_RE.is_match(&parent.email) {
        problems.push(format!("Invalid parent email '{}'", parent.email));
    }
    if parent.contact.iter().all(|contact| contact.trim().is_empty()) {
        problems.push(format!("{} is required", ImportField::ParentContact.label()));
    }

    match cache.find_faculty_by_id(&student.faculty_id) {
        None => problems.push(format!("Faculty '{}' not found", student.faculty_id)),
        Some(faculty) => match faculty.find_class(&student.class) {
            None => problems.push(format!(
                "Class '{}' does not exist in faculty '{}'",
                student.class, faculty.name
            )),
            Some(class) => {
                if let Some(section) = &student.section {
                    if cache.find_section(&faculty.id, class, section).is_none() {
                        problems.push(format!(
                            "Section '{}' not found for class '{}' in faculty '{}'",
                            section, class, faculty.name
                        ));
                    }
                }
            }
        },
    }

    if !problems.is_empty() {
        bail!("Row {} ({}): {}", row.row_number, student.name, problems.join("; "));
    }
    Ok(())
}

/// Trimmed text of a cell, `None` when blank. Integral numbers lose their
/// fractional part so spreadsheet `10.0` reads as `"10"`.
pub fn cell_text(cell: &Value) -> Option<String> {
    let text = match cell {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn split_contacts(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|contact| !contact.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collections;
    use crate::models::{Faculty, Parent, Section};
    use crate::store::InMemoryDocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn cache() -> LookupCache {
        let cache = LookupCache::new(Arc::new(InMemoryDocumentStore::new()), Collections::default());
        cache.seed(
            vec![Faculty {
                id: "fac-sci".into(),
                name: "Science".into(),
                classes: vec!["10".into(), "11".into()],
            }],
            vec![Section {
                id: "sec-a".into(),
                name: "A".into(),
                class: "10".into(),
                faculty_id: "fac-sci".into(),
                subjects: vec![],
            }],
            vec![Parent {
                id: "parent-1".into(),
                name: "Jane".into(),
                email: "Alice-P@x.com".into(),
                contact: vec![],
                students: vec![],
            }],
        );
        cache
    }

    fn headers() -> Vec<String> {
        ["Name", "Class", "Faculty", "Parent Email", "Parent", "Contact", "Section"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::from([
            ("Name".to_string(), ImportField::StdName),
            ("Class".to_string(), ImportField::Class),
            ("Faculty".to_string(), ImportField::FacultyId),
            ("Parent Email".to_string(), ImportField::ParentEmail),
            ("Parent".to_string(), ImportField::ParentName),
            ("Contact".to_string(), ImportField::ParentContact),
            ("Section".to_string(), ImportField::Section),
        ])
    }

    fn row(cells: &[Value]) -> Vec<Value> {
        cells.to_vec()
    }

    #[test]
    fn resolves_a_complete_row() {
        let rows = vec![row(&[
            json!("Bob"),
            json!(10.0),
            json!("science"),
            json!("bob-p@x.com"),
            json!("Ram"),
            json!("9800000000, 9811111111"),
            json!("a"),
        ])];
        let report = validate(&rows, &headers(), &mapping(), &cache()).unwrap();

        assert_eq!(report.errors, vec![]);
        let validated = &report.valid[0];
        assert_eq!(validated.row_number, 2);
        assert_eq!(validated.student_data.class, "10");
        assert_eq!(validated.student_data.faculty_id, "fac-sci");
        assert_eq!(validated.student_data.section.as_deref(), Some("A"));
        assert_eq!(validated.parent_info.contact, vec!["9800000000", "9811111111"]);
        assert_eq!(validated.parent_info.existing_parent_id, None);
    }

    #[test]
    fn empty_rows_are_skipped_silently() {
        let rows = vec![
            row(&[Value::Null, json!("  "), Value::Null, Value::Null, Value::Null, Value::Null, Value::Null]),
            vec![],
        ];
        let report = validate(&rows, &headers(), &mapping(), &cache()).unwrap();
        assert!(report.valid.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(report.skipped_empty, 2);
        assert_eq!(report.total_rows, 2);
    }

    #[test]
    fn missing_required_cells_reject_the_row() {
        let rows = vec![row(&[
            json!("Carol"),
            json!("10"),
            json!("Science"),
            Value::Null,
            json!("Mina"),
            Value::Null,
            Value::Null,
        ])];
        let report = validate(&rows, &headers(), &mapping(), &cache()).unwrap();

        assert!(report.valid.is_empty());
        assert_eq!(
            report.errors,
            vec![RowError {
                row: 2,
                messages: vec![
                    "Row 2 (Carol): Parent email is required".to_string(),
                    "Row 2 (Carol): Parent contact is required".to_string(),
                ],
            }]
        );
    }

    #[test]
    fn unknown_faculty_is_rejected_even_without_a_class() {
        let rows = vec![row(&[
            Value::Null,
            Value::Null,
            json!("X"),
            json!("not-an-email"),
            json!("Mina"),
            json!("98"),
            Value::Null,
        ])];
        let report = validate(&rows, &headers(), &mapping(), &cache()).unwrap();
        let messages = &report.errors[0].messages;

        assert!(messages.contains(&"Row 2 (unknown): Faculty 'X' not found".to_string()));
        assert!(messages.iter().any(|m| m.contains("Invalid parent email")));
        assert!(messages.iter().any(|m| m.contains("Student name is required")));
    }

    #[test]
    fn class_and_section_must_belong_to_the_faculty() {
        let rows = vec![
            row(&[json!("Dan"), json!("12"), json!("Science"), json!("d@x.com"), json!("P"), json!("1"), Value::Null]),
            row(&[json!("Eve"), json!("11"), json!("Science"), json!("e@x.com"), json!("P"), json!("1"), json!("A")]),
        ];
        let report = validate(&rows, &headers(), &mapping(), &cache()).unwrap();

        assert_eq!(report.error_count, 2);
        assert_eq!(
            report.errors[0].messages,
            vec!["Row 2 (Dan): Class '12' does not exist in faculty 'Science'".to_string()]
        );
        assert_eq!(
            report.errors[1].messages,
            vec!["Row 3 (Eve): Section 'A' not found for class '11' in faculty 'Science'".to_string()]
        );
    }

    #[test]
    fn existing_parent_email_is_attached_as_a_hint() {
        let rows = vec![row(&[
            json!("Alice"),
            json!("10"),
            json!("Science"),
            json!("alice-p@x.com"),
            json!("Jane"),
            json!(9800000000u64),
            Value::Null,
        ])];
        let report = validate(&rows, &headers(), &mapping(), &cache()).unwrap();
        let parent = &report.valid[0].parent_info;
        assert_eq!(parent.existing_parent_id.as_deref(), Some("parent-1"));
        assert_eq!(parent.contact, vec!["9800000000"]);
    }

    #[test]
    fn duplicate_mapping_short_circuits() {
        let mut mapping = mapping();
        mapping.insert("Section".to_string(), ImportField::StdName);
        let rows = vec![row(&[json!("x")])];
        assert!(matches!(
            validate(&rows, &headers(), &mapping, &cache()),
            Err(MappingError::DuplicateFields(_))
        ));
    }

    #[test]
    fn index_keyed_mapping_resolves_a_science_row() {
        let headers: Vec<String> = ["Student", "Grade", "Stream", "Email", "Guardian", "Phone"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = ColumnMapping::from([
            ("0".to_string(), ImportField::StdName),
            ("1".to_string(), ImportField::Class),
            ("2".to_string(), ImportField::FacultyId),
            ("3".to_string(), ImportField::ParentEmail),
            ("4".to_string(), ImportField::ParentName),
            ("5".to_string(), ImportField::ParentContact),
        ]);
        let rows = vec![row(&[
            json!("Alice"),
            json!("10"),
            json!("Science"),
            json!("alice-p@x.com"),
            json!("Jane"),
            json!("9800000000"),
        ])];

        let report = validate(&rows, &headers, &mapping, &cache()).unwrap();

        assert!(report.errors.is_empty());
        assert_eq!(report.valid.len(), 1);
        let validated = &report.valid[0];
        assert_eq!(validated.student_data.name, "Alice");
        assert_eq!(validated.student_data.class, "10");
        assert_eq!(validated.student_data.faculty_id, "fac-sci");
        assert_eq!(validated.parent_info.email, "alice-p@x.com");
        assert_eq!(validated.parent_info.name, "Jane");
        assert_eq!(validated.parent_info.contact, vec!["9800000000"]);
    }

    #[test]
    fn email_check_matches_anywhere_in_the_cell() {
        assert!(EMAIL_RE.is_match("alice-p@x.com"));
        assert!(EMAIL_RE.is_match("Alice <alice-p@x.com>"));
        assert!(!EMAIL_RE.is_match("alice-p@x"));
    }

    fn resolved_row() -> ValidatedRow {
        ValidatedRow {
            row_number: 2,
            student_data: StudentData {
                name: "Bob".into(),
                class: "10".into(),
                faculty_id: "fac-sci".into(),
                section: Some("A".into()),
                address: None,
                gender: None,
                dob: None,
            },
            parent_info: ParentInfo {
                name: "Ram".into(),
                email: "ram@x.com".into(),
                contact: vec!["98".into()],
                existing_parent_id: None,
            },
        }
    }

    #[test]
    fn resolved_rows_pass_the_reference_check() {
        assert!(check_references(&resolved_row(), &cache()).is_ok());
    }

    #[test]
    fn forged_references_are_rejected() {
        let cache = cache();

        let mut row = resolved_row();
        row.student_data.faculty_id = "no-such-faculty".into();
        let err = check_references(&row, &cache).unwrap_err().to_string();
        assert_eq!(err, "Row 2 (Bob): Faculty 'no-such-faculty' not found");

        let mut row = resolved_row();
        row.student_data.class = "12".into();
        row.student_data.section = None;
        let err = check_references(&row, &cache).unwrap_err().to_string();
        assert!(err.contains("Class '12' does not exist in faculty 'Science'"));

        let mut row = resolved_row();
        row.student_data.section = Some("Z".into());
        row.parent_info.email = "not-an-email".into();
        let err = check_references(&row, &cache).unwrap_err().to_string();
        assert!(err.contains("Section 'Z' not found for class '10'"));
        assert!(err.contains("Invalid parent email 'not-an-email'"));
    }

    #[test]
    fn cell_text_normalizes_numbers() {
        assert_eq!(cell_text(&json!(10.0)), Some("10".to_string()));
        assert_eq!(cell_text(&json!(10.5)), Some("10.5".to_string()));
        assert_eq!(cell_text(&json!("  ")), None);
        assert_eq!(cell_text(&json!(true)), Some("true".to_string()));
    }
}
