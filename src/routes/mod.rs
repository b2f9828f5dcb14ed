use axum::extract::Multipart;
use http::StatusCode;

pub mod health {
    pub mod route;
    pub use route::create_route;
}

pub mod signup {
    pub mod route;
    pub use route::create_route;
}

pub mod import {
    pub mod dto;
    pub mod route;
    pub use route::create_route;
}

pub mod cache {
    pub mod dto;
    pub mod route;
    pub use route::create_route;
}

pub mod selection {
    pub mod dto;
    pub mod route;
    pub use route::create_route;
}

pub mod maintenance {
    pub mod route;
    pub use route::create_route;
}

pub mod files {
    pub mod dto;
    pub mod route;
    pub use route::create_route;
}

/// An uploaded `file` field: original file name and contents.
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Reads the first multipart field named `file`.
pub async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, (StatusCode, String)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart: {}", e),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file: {}", e),
            )
        })?;
        return Ok(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Err((StatusCode::BAD_REQUEST, "No file provided".to_string()))
}
