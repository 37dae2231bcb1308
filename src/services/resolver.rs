use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::job_store::JobStore;
use crate::models::JobStatus;
use crate::services::error::UpscaleError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::error;
use uuid::Uuid;

/// A processed artifact ready to be served: a read-only stream plus
/// the headers-worth of metadata the surrounding layer needs.
pub struct ResolvedArtifact {
    pub stream: Box<dyn AsyncRead + Send + Unpin>,
    pub content_type: String,
    pub download_name: String,
    pub size_bytes: u64,
}

// The stream is opaque; print the metadata only.
impl fmt::Debug for ResolvedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedArtifact")
            .field("content_type", &self.content_type)
            .field("download_name", &self.download_name)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Resolves a completed job into a servable artifact, distinguishing
/// "never existed", "not done yet" and "done but the file is gone".
pub struct ResultResolver {
    store: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ResultResolver {
    pub fn new(store: Arc<dyn JobStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { store, artifacts }
    }

    pub async fn resolve(&self, job_id: Uuid) -> Result<ResolvedArtifact, UpscaleError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or(UpscaleError::NotFound(job_id))?;

        let processed_path = match (&job.status, &job.processed_file_path) {
            (JobStatus::Processed, Some(path)) => path.clone(),
            _ => {
                return Err(UpscaleError::NotReady {
                    id: job_id,
                    status: job.status,
                })
            }
        };

        if !self.artifacts.exists(&processed_path).await? {
            error!(
                "processed artifact missing for job {}: {:?}",
                job_id, processed_path
            );
            return Err(UpscaleError::ArtifactMissing(job_id));
        }

        let content_type = probe_content_type(&processed_path).await;
        let download_name = download_file_name(&job.original_file_name);
        let size_bytes = self.artifacts.size(&processed_path).await?;
        let stream = self.artifacts.read(&processed_path).await?;

        Ok(ResolvedArtifact {
            stream,
            content_type,
            download_name,
            size_bytes,
        })
    }
}

/// Determine the content type of an artifact by probing its bytes,
/// falling back to the extension for common image formats, then to a
/// generic binary type.
async fn probe_content_type(path: &Path) -> String {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().to_string();
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "gif" => "image/gif".to_string(),
        "webp" => "image/webp".to_string(),
        "bmp" => "image/bmp".to_string(),
        "tif" | "tiff" => "image/tiff".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

/// Derive the download name by inserting `_upscaled` before the
/// original extension, or appending it when there is none.
pub fn download_file_name(original_name: &str) -> String {
    match original_name.rfind('.') {
        Some(idx) if idx > 0 => {
            format!(
                "{}_upscaled{}",
                &original_name[..idx],
                &original_name[idx..]
            )
        }
        _ => format!("{}_upscaled", original_name),
    }
}
