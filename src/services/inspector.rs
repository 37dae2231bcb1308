use crate::models::ImageInfo;
use crate::services::error::UpscaleError;
use image::io::Reader as ImageReader;
use std::io::Cursor;
use std::path::Path;

/// Probes stored payloads for pixel dimensions and byte size. Used
/// both to validate uploads and to verify the worker actually produced
/// a decodable image before a job is marked processed.
pub struct MetadataInspector;

impl MetadataInspector {
    /// Inspect an in-memory payload. The format is guessed from the
    /// bytes, never from a file name; only the header is decoded.
    pub fn inspect_bytes(data: &[u8]) -> Result<ImageInfo, UpscaleError> {
        if data.is_empty() {
            return Err(UpscaleError::InvalidPayload(
                "payload is empty".to_string(),
            ));
        }

        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| UpscaleError::InvalidPayload(format!("unreadable payload: {}", e)))?;

        let (width, height) = reader.into_dimensions().map_err(|e| {
            UpscaleError::InvalidPayload(format!("payload is not a decodable image: {}", e))
        })?;

        Ok(ImageInfo {
            width,
            height,
            size_bytes: data.len() as u64,
        })
    }

    /// Inspect a stored artifact. A missing file is an invalid payload
    /// too: a worker exit code of zero does not guarantee an artifact.
    pub async fn inspect(path: &Path) -> Result<ImageInfo, UpscaleError> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            UpscaleError::InvalidPayload(format!("cannot read artifact {:?}: {}", path, e))
        })?;
        Self::inspect_bytes(&data)
    }
}
