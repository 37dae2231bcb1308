use crate::models::UpscalingMethod;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Binary payload storage for originals and processed results,
/// addressed by path. Writes always go to freshly generated names, so
/// paths are write-once and concurrent submissions cannot collide.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist an uploaded payload under a collision-free name derived
    /// from a fresh UUID, keeping the original's extension. Returns
    /// the absolute path of the stored artifact.
    async fn write(&self, original_name: &str, data: &[u8]) -> Result<PathBuf>;

    /// Open a read-only stream over a stored artifact.
    async fn read(&self, path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn size(&self, path: &Path) -> Result<u64>;

    /// Deterministic output path for a job's processed artifact. The
    /// name is a pure function of (job id, original path, method,
    /// scale), so re-deriving it for the same job always agrees.
    fn processed_path(
        &self,
        job_id: Uuid,
        original_path: &Path,
        method: UpscalingMethod,
        scale: u32,
    ) -> PathBuf;
}

/// Artifact store rooted at a local directory, with processed results
/// under a `processed/` subdirectory.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the upload and processed directories if absent.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join("processed"))
            .await
            .with_context(|| format!("failed to create artifact dirs under {:?}", self.root))?;
        Ok(())
    }

    fn extension_of(name: &str) -> &str {
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx..],
            _ => "",
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn write(&self, original_name: &str, data: &[u8]) -> Result<PathBuf> {
        let ext = Self::extension_of(original_name);
        let stored_name = format!("{}{}", Uuid::new_v4(), ext);
        let path = self.root.join(stored_name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write artifact {:?}", path))?;
        Ok(path)
    }

    async fn read(&self, path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open artifact {:?}", path))?;
        Ok(Box::new(file))
    }

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read artifact {:?}", path))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
    }

    async fn size(&self, path: &Path) -> Result<u64> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat artifact {:?}", path))?;
        Ok(meta.len())
    }

    fn processed_path(
        &self,
        job_id: Uuid,
        original_path: &Path,
        method: UpscalingMethod,
        scale: u32,
    ) -> PathBuf {
        let ext = original_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.root
            .join("processed")
            .join(format!("{}_{}_x{}{}", job_id, method, scale, ext))
    }
}
