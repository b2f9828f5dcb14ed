use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Student/parent attribute a spreadsheet column can feed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum ImportField {
    StdName,
    Class,
    FacultyId,
    Section,
    Address,
    Gender,
    Dob,
    ParentName,
    ParentEmail,
    ParentContact,
    Ignore,
}

impl ImportField {
    pub const REQUIRED: [ImportField; 6] = [
        ImportField::StdName,
        ImportField::Class,
        ImportField::FacultyId,
        ImportField::ParentName,
        ImportField::ParentEmail,
        ImportField::ParentContact,
    ];

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImportField::StdName => "Student name",
            ImportField::Class => "Class",
            ImportField::FacultyId => "Faculty",
            ImportField::Section => "Section",
            ImportField::Address => "Address",
            ImportField::Gender => "Gender",
            ImportField::Dob => "Date of birth",
            ImportField::ParentName => "Parent name",
            ImportField::ParentEmail => "Parent email",
            ImportField::ParentContact => "Parent contact",
            ImportField::Ignore => "Ignored",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ImportField::StdName => &["stdname", "studentname", "student", "name", "fullname"],
            ImportField::Class => &["class", "classname", "grade"],
            ImportField::FacultyId => &["faculty", "facultyname", "facultyid", "stream", "department"],
            ImportField::Section => &["section", "sectionname", "division"],
            ImportField::Address => &["address", "studentaddress"],
            ImportField::Gender => &["gender", "sex"],
            ImportField::Dob => &["dob", "dateofbirth", "birthdate", "birthday"],
            ImportField::ParentName => &["parentname", "guardianname", "parent", "guardian"],
            ImportField::ParentEmail => &["parentemail", "guardianemail", "parentmail", "email"],
            ImportField::ParentContact => &[
                "parentcontact",
                "parentphone",
                "guardiancontact",
                "contact",
                "contactnumber",
                "phone",
                "phonenumber",
                "mobile",
            ],
            ImportField::Ignore => &[],
        }
    }

    const SUGGESTABLE: [ImportField; 10] = [
        ImportField::StdName,
        ImportField::Class,
        ImportField::FacultyId,
        ImportField::Section,
        ImportField::Address,
        ImportField::Gender,
        ImportField::Dob,
        ImportField::ParentName,
        ImportField::ParentEmail,
        ImportField::ParentContact,
    ];
}

impl fmt::Display for ImportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Spreadsheet column → field. Keys are header names; a key that is not a
/// header but parses as a column index addresses that column.
pub type ColumnMapping = BTreeMap<String, ImportField>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateField {
    pub field: ImportField,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Mapped column '{0}' is not in the spreadsheet headers")]
    UnknownColumn(String),
    #[error("Each field can only be mapped once: {}", describe_duplicates(.0))]
    DuplicateFields(Vec<DuplicateField>),
    #[error("Required fields are not mapped: {}", describe_fields(.0))]
    MissingRequired(Vec<ImportField>),
}

fn describe_duplicates(duplicates: &[DuplicateField]) -> String {
    duplicates
        .iter()
        .map(|dup| format!("{} ← {}", dup.field, dup.columns.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_fields(fields: &[ImportField]) -> String {
    fields
        .iter()
        .map(ImportField::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns a mapping into `(column index, field)` pairs, ignoring `Ignore`.
/// Fails before any row is looked at if the mapping is not usable.
pub fn resolve_columns(
    headers: &[String],
    mapping: &ColumnMapping,
) -> Result<Vec<(usize, ImportField)>, MappingError> {
    let mut columns = Vec::new();
    for (key, field) in mapping {
        if *field == ImportField::Ignore {
            continue;
        }
        let index = headers
            .iter()
            .position(|header| header == key)
            .or_else(|| key.trim().parse::<usize>().ok().filter(|i| *i < headers.len()))
            .ok_or_else(|| MappingError::UnknownColumn(key.clone()))?;
        columns.push((index, *field, key.clone()));
    }

    let mut by_field: BTreeMap<ImportField, Vec<String>> = BTreeMap::new();
    for (_, field, key) in &columns {
        by_field.entry(*field).or_default().push(key.clone());
    }

    let duplicates: Vec<DuplicateField> = by_field
        .iter()
        .filter(|(_, keys)| keys.len() > 1)
        .map(|(field, keys)| DuplicateField {
            field: *field,
            columns: keys.clone(),
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(MappingError::DuplicateFields(duplicates));
    }

    let missing: Vec<ImportField> = ImportField::REQUIRED
        .into_iter()
        .filter(|field| !by_field.contains_key(field))
        .collect();
    if !missing.is_empty() {
        return Err(MappingError::MissingRequired(missing));
    }

    columns.sort_by_key(|(index, _, _)| *index);
    Ok(columns
        .into_iter()
        .map(|(index, field, _)| (index, field))
        .collect())
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Proposes a mapping from header names. Each field is used at most once;
/// the first matching column wins and the rest are ignored.
pub fn suggest_mapping(headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    let mut taken: Vec<ImportField> = Vec::new();

    for header in headers {
        if header.is_empty() || mapping.contains_key(header) {
            continue;
        }
        let normalized = normalize_header(header);
        let field = ImportField::SUGGESTABLE
            .into_iter()
            .filter(|field| !taken.contains(field))
            .find(|field| field.aliases().contains(&normalized.as_str()))
            .unwrap_or(ImportField::Ignore);
        if field != ImportField::Ignore {
            taken.push(field);
        }
        mapping.insert(header.clone(), field);
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn full_mapping() -> ColumnMapping {
        ColumnMapping::from([
            ("Name".to_string(), ImportField::StdName),
            ("Class".to_string(), ImportField::Class),
            ("Faculty".to_string(), ImportField::FacultyId),
            ("Parent".to_string(), ImportField::ParentName),
            ("Email".to_string(), ImportField::ParentEmail),
            ("Phone".to_string(), ImportField::ParentContact),
            ("Notes".to_string(), ImportField::Ignore),
        ])
    }

    #[test]
    fn resolves_columns_in_sheet_order() {
        let headers = headers(&["Faculty", "Name", "Class", "Parent", "Email", "Phone", "Notes"]);
        let columns = resolve_columns(&headers, &full_mapping()).unwrap();
        assert_eq!(columns[0], (0, ImportField::FacultyId));
        assert_eq!(columns.len(), 6);
    }

    #[test]
    fn duplicate_field_blocks_the_batch() {
        let headers = headers(&["Name", "Class", "Faculty", "Parent", "Email", "Phone", "Notes"]);
        let mut mapping = full_mapping();
        mapping.insert("Notes".to_string(), ImportField::Class);

        let err = resolve_columns(&headers, &mapping).unwrap_err();
        assert_eq!(
            err,
            MappingError::DuplicateFields(vec![DuplicateField {
                field: ImportField::Class,
                columns: vec!["Class".to_string(), "Notes".to_string()],
            }])
        );
        assert!(err.to_string().contains("Class ← Class, Notes"));
    }

    #[test]
    fn ignored_columns_may_repeat() {
        let headers = headers(&["Name", "Class", "Faculty", "Parent", "Email", "Phone", "Notes", "Extra"]);
        let mut mapping = full_mapping();
        mapping.insert("Extra".to_string(), ImportField::Ignore);
        assert!(resolve_columns(&headers, &mapping).is_ok());
    }

    #[test]
    fn numeric_keys_address_columns() {
        let headers = headers(&["A", "B", "C", "D", "E", "F"]);
        let mapping = ColumnMapping::from([
            ("0".to_string(), ImportField::StdName),
            ("1".to_string(), ImportField::Class),
            ("2".to_string(), ImportField::FacultyId),
            ("3".to_string(), ImportField::ParentEmail),
            ("4".to_string(), ImportField::ParentName),
            ("5".to_string(), ImportField::ParentContact),
        ]);
        let columns = resolve_columns(&headers, &mapping).unwrap();
        assert_eq!(columns[3], (3, ImportField::ParentEmail));
    }

    #[test]
    fn unmapped_required_field_is_reported() {
        let headers = headers(&["Name", "Class", "Faculty", "Parent", "Email", "Phone", "Notes"]);
        let mut mapping = full_mapping();
        mapping.insert("Phone".to_string(), ImportField::Ignore);
        assert_eq!(
            resolve_columns(&headers, &mapping).unwrap_err(),
            MappingError::MissingRequired(vec![ImportField::ParentContact])
        );
    }

    #[test]
    fn unknown_column_is_reported() {
        let headers = headers(&["Name"]);
        let mapping = ColumnMapping::from([("Nmae".to_string(), ImportField::StdName)]);
        assert_eq!(
            resolve_columns(&headers, &mapping).unwrap_err(),
            MappingError::UnknownColumn("Nmae".to_string())
        );
    }

    #[test]
    fn suggests_fields_from_headers() {
        let headers = headers(&[
            "Student Name",
            "Grade",
            "Faculty",
            "Section",
            "Guardian Name",
            "Parent E-mail",
            "Phone Number",
            "Email",
            "Remarks",
        ]);
        let mapping = suggest_mapping(&headers);

        assert_eq!(mapping["Student Name"], ImportField::StdName);
        assert_eq!(mapping["Grade"], ImportField::Class);
        assert_eq!(mapping["Faculty"], ImportField::FacultyId);
        assert_eq!(mapping["Section"], ImportField::Section);
        assert_eq!(mapping["Guardian Name"], ImportField::ParentName);
        assert_eq!(mapping["Parent E-mail"], ImportField::ParentEmail);
        assert_eq!(mapping["Phone Number"], ImportField::ParentContact);
        // Parent email already taken by an earlier column.
        assert_eq!(mapping["Email"], ImportField::Ignore);
        assert_eq!(mapping["Remarks"], ImportField::Ignore);
        assert!(resolve_columns(&headers, &mapping).is_ok());
    }

    #[test]
    fn fields_use_camel_case_on_the_wire() {
        assert_eq!(serde_json::to_string(&ImportField::StdName).unwrap(), "\"stdName\"");
        assert_eq!(
            serde_json::from_str::<ImportField>("\"facultyId\"").unwrap(),
            ImportField::FacultyId
        );
    }
}
