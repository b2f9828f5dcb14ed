use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub bucket_id: String,
    pub size: usize,
}

/// Attachment storage used by assignment and gallery uploads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_file(&self, bucket_id: &str, file_id: &str, bytes: &[u8]) -> Result<StoredFile>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()>;

    fn get_download_url(&self, bucket_id: &str, file_id: &str) -> Result<String>;
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn file_path(&self, bucket_id: &str, file_id: &str) -> Result<PathBuf> {
        let bucket = clean_segment(bucket_id)?;
        let file = clean_segment(file_id)?;
        Ok(self.root.join(bucket).join(file))
    }
}

fn clean_segment(segment: &str) -> Result<String> {
    let cleaned = sanitize_filename::sanitize(segment.trim()).to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(anyhow!("Invalid path segment: {:?}", segment));
    }
    Ok(cleaned)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create_file(&self, bucket_id: &str, file_id: &str, bytes: &[u8]) -> Result<StoredFile> {
        let path = self.file_path(bucket_id, file_id)?;
        if let Some(parent) = Path::new(&path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create bucket directory")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create file {}", path.display()))?;
        file.write_all(bytes).await.context("Failed to write file data")?;
        file.flush().await.context("Failed to flush file")?;

        tracing::debug!(bucket = bucket_id, file = file_id, size = bytes.len(), "Stored file");

        Ok(StoredFile {
            id: clean_segment(file_id)?,
            bucket_id: clean_segment(bucket_id)?,
            size: bytes.len(),
        })
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        let path = self.file_path(bucket_id, file_id)?;
        fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete file {}/{}", bucket_id, file_id))
    }

    fn get_download_url(&self, bucket_id: &str, file_id: &str) -> Result<String> {
        Ok(format!(
            "{}/files/{}/{}",
            self.public_base_url,
            clean_segment(bucket_id)?,
            clean_segment(file_id)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:8080/");

        let stored = store
            .create_file("gallery", "photo.png", b"png-bytes")
            .await
            .unwrap();
        assert_eq!(stored.size, 9);
        assert!(dir.path().join("gallery").join("photo.png").exists());

        assert_eq!(
            store.get_download_url("gallery", "photo.png").unwrap(),
            "http://localhost:8080/files/gallery/photo.png"
        );

        store.delete_file("gallery", "photo.png").await.unwrap();
        assert!(store.delete_file("gallery", "photo.png").await.is_err());
    }

    #[tokio::test]
    async fn path_segments_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost");

        let stored = store
            .create_file("assignments", "../../etc/passwd", b"x")
            .await
            .unwrap();
        assert!(!stored.id.contains('/'));
        assert!(dir.path().join("assignments").join(&stored.id).exists());
        assert!(store.create_file("..", "a.txt", b"x").await.is_err());
    }
}
