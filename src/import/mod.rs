//! Bulk student import: parse → map columns → validate → commit.

pub mod commit;
pub mod mapping;
pub mod parser;
pub mod validator;

pub use commit::{CommitOrchestrator, CommitProgress, CommitReport, CommitRowError, CommitWarning};
pub use mapping::{ColumnMapping, DuplicateField, ImportField, MappingError, suggest_mapping};
pub use parser::{ParsedSheet, parse_spreadsheet};
pub use validator::{
    ParentInfo, RowError, StudentData, ValidatedRow, ValidationReport, check_references, validate,
};
