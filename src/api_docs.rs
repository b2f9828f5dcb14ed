use utoipa::OpenApi;

use crate::cache::CollectionKind;
use crate::cascade::{Candidate, LevelSnapshot};
use crate::identity::{SignupRequest, SignupResponse};
use crate::import::{
    CommitReport, CommitRowError, CommitWarning, DuplicateField, ImportField, ParentInfo, RowError,
    StudentData, ValidatedRow, ValidationReport,
};
use crate::maintenance::{ReconcileFailure, ReconcileReport};
use crate::routes;
use crate::store::StoredFile;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Admin API",
        description = "Bulk student import, lookup cache and attachment endpoints"
    ),
    paths(
        routes::health::route::health,
        routes::signup::route::signup,
        routes::import::route::parse_import_file,
        routes::import::route::validate_import,
        routes::import::route::commit_import,
        routes::cache::route::refresh_all,
        routes::cache::route::refresh_kind,
        routes::selection::route::get_selection_options,
        routes::maintenance::route::reconcile_links,
        routes::files::route::upload_file,
        routes::files::route::delete_file,
        routes::files::route::get_file_url,
    ),
    components(schemas(
        routes::health::route::HealthResponse,
        SignupRequest,
        SignupResponse,
        routes::import::dto::ParseResponse,
        routes::import::dto::ValidateRequest,
        routes::import::dto::CommitRequest,
        ImportField,
        DuplicateField,
        StudentData,
        ParentInfo,
        ValidatedRow,
        RowError,
        ValidationReport,
        CommitReport,
        CommitRowError,
        CommitWarning,
        CollectionKind,
        routes::cache::dto::RefreshResult,
        routes::cache::dto::RefreshResponse,
        Candidate,
        LevelSnapshot,
        routes::selection::dto::SelectionResponse,
        ReconcileReport,
        ReconcileFailure,
        StoredFile,
        routes::files::dto::FileUploadResponse,
        routes::files::dto::FileUrlResponse,
    )),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Users", description = "Login identity creation"),
        (name = "Student Import", description = "Spreadsheet parse, validate and commit"),
        (name = "Cache", description = "Lookup cache refresh"),
        (name = "Selection", description = "Faculty, class and section options"),
        (name = "Maintenance", description = "Data repair jobs"),
        (name = "Files", description = "Attachment storage")
    )
)]
pub struct ApiDoc;
