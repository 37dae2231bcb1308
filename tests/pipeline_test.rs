use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use rust_upscale_backend::config::AppConfig;
use rust_upscale_backend::infrastructure::artifact_store::{ArtifactStore, LocalArtifactStore};
use rust_upscale_backend::infrastructure::job_store::{InMemoryJobStore, JobStore};
use rust_upscale_backend::models::{JobStatus, UpscalingMethod};
use rust_upscale_backend::services::error::UpscaleError;
use rust_upscale_backend::services::invoker::WorkerInvoker;
use rust_upscale_backend::services::pipeline::JobPipeline;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Stub worker that behaves like the real upscaling script: reads the
/// original, writes a scaled PNG to the processed path, exits 0.
struct UpscalingStub;

#[async_trait]
impl WorkerInvoker for UpscalingStub {
    async fn invoke(
        &self,
        original_path: &Path,
        processed_path: &Path,
        _weights_path: Option<&Path>,
        _method: UpscalingMethod,
        scale: u32,
    ) -> Result<i32, UpscaleError> {
        let data = tokio::fs::read(original_path).await.unwrap();
        let img = image::load_from_memory(&data).unwrap();
        let scaled = img.resize_exact(
            img.width() * scale,
            img.height() * scale,
            image::imageops::FilterType::Triangle,
        );
        let mut out = Vec::new();
        scaled
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        tokio::fs::write(processed_path, out).await.unwrap();
        Ok(0)
    }
}

/// Stub worker that exits with a fixed nonzero code without producing
/// an artifact.
struct FailingStub(i32);

#[async_trait]
impl WorkerInvoker for FailingStub {
    async fn invoke(
        &self,
        _original_path: &Path,
        _processed_path: &Path,
        _weights_path: Option<&Path>,
        _method: UpscalingMethod,
        _scale: u32,
    ) -> Result<i32, UpscaleError> {
        Ok(self.0)
    }
}

/// Stub worker that exits 0 but leaves a non-image artifact behind.
struct GarbageStub;

#[async_trait]
impl WorkerInvoker for GarbageStub {
    async fn invoke(
        &self,
        _original_path: &Path,
        processed_path: &Path,
        _weights_path: Option<&Path>,
        _method: UpscalingMethod,
        _scale: u32,
    ) -> Result<i32, UpscaleError> {
        tokio::fs::write(processed_path, b"not an image at all")
            .await
            .unwrap();
        Ok(0)
    }
}

/// Stub worker that records the job's stored state at the moment it
/// is launched, then behaves like a successful upscaler.
struct SnapshotStub {
    store: Arc<dyn JobStore>,
    job_id: Arc<Mutex<Option<uuid::Uuid>>>,
    observed: Arc<Mutex<Option<(JobStatus, bool)>>>,
}

#[async_trait]
impl WorkerInvoker for SnapshotStub {
    async fn invoke(
        &self,
        original_path: &Path,
        processed_path: &Path,
        _weights_path: Option<&Path>,
        _method: UpscalingMethod,
        scale: u32,
    ) -> Result<i32, UpscaleError> {
        let id = self.job_id.lock().unwrap().expect("job id registered");
        let job = self.store.get(id).await.unwrap().unwrap();
        *self.observed.lock().unwrap() = Some((job.status, job.process_start_time.is_some()));

        let data = tokio::fs::read(original_path).await.unwrap();
        let img = image::load_from_memory(&data).unwrap();
        let scaled = img.resize_exact(
            img.width() * scale,
            img.height() * scale,
            image::imageops::FilterType::Triangle,
        );
        let mut out = Vec::new();
        scaled
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        tokio::fs::write(processed_path, out).await.unwrap();
        Ok(0)
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::new(width, height);
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

struct Harness {
    _dir: TempDir,
    // Keeps the queue open; tests drive `process` directly instead of
    // spawning the pool so every intermediate state is observable.
    _queue_rx: mpsc::Receiver<uuid::Uuid>,
    pipeline: JobPipeline,
    store: Arc<dyn JobStore>,
}

async fn harness(invoker: Arc<dyn WorkerInvoker>, config: AppConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let local = LocalArtifactStore::new(dir.path().to_path_buf());
    local.ensure_dirs().await.unwrap();
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(local);
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let (tx, rx) = mpsc::channel(16);
    let pipeline = JobPipeline::new(store.clone(), artifacts, invoker, config, tx);
    Harness {
        _dir: dir,
        _queue_rx: rx,
        pipeline,
        store,
    }
}

#[tokio::test]
async fn test_submit_returns_uploaded_before_processing() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let id = h
        .pipeline
        .submit(&png_bytes(8, 6), "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap();

    let view = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Uploaded);
    assert_eq!(view.original_resolution, "8x6");
    assert_eq!(view.method, UpscalingMethod::Bicubic);
    assert_eq!(view.scale, 2);
    assert!(view.upscaled_resolution.is_none());
    assert!(view.process_start_time.is_none());
}

#[tokio::test]
async fn test_submit_rejects_empty_payload() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let err = h
        .pipeline
        .submit(b"", "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, UpscaleError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_submit_rejects_non_image_payload() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let err = h
        .pipeline
        .submit(b"just text", "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, UpscaleError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_submit_rejects_zero_scale() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let err = h
        .pipeline
        .submit(&png_bytes(4, 4), "cat.png", UpscalingMethod::Bicubic, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, UpscaleError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_successful_processing_sets_all_result_fields() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let id = h
        .pipeline
        .submit(&png_bytes(8, 6), "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap();

    h.pipeline.process(id).await;

    let view = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Processed);
    assert_eq!(view.upscaled_resolution.as_deref(), Some("16x12"));
    assert!(view.process_start_time.is_some());
    assert!(view.process_end_time.is_some());

    // The stored sizes match the artifact actually on disk.
    let job = h.store.get(id).await.unwrap().unwrap();
    let path = job.processed_file_path.expect("processed path set");
    let on_disk = tokio::fs::metadata(&path).await.unwrap().len();
    assert_eq!(view.upscaled_file_size, Some(on_disk));
}

#[tokio::test]
async fn test_worker_failure_ends_in_error_without_result() {
    let h = harness(Arc::new(FailingStub(2)), AppConfig::default()).await;
    let id = h
        .pipeline
        .submit(&png_bytes(8, 6), "cat.png", UpscalingMethod::Bilinear, 2)
        .await
        .unwrap();

    h.pipeline.process(id).await;

    let view = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Error);
    assert!(view.upscaled_resolution.is_none());
    assert!(view.upscaled_file_size.is_none());
    assert!(view.process_end_time.is_some());

    let job = h.store.get(id).await.unwrap().unwrap();
    assert!(job.processed_file_path.is_none());
}

#[tokio::test]
async fn test_missing_weights_goes_straight_to_error() {
    // ESPCN needs weights; the default config has none configured.
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let id = h
        .pipeline
        .submit(&png_bytes(8, 6), "cat.png", UpscalingMethod::Espcn, 2)
        .await
        .unwrap();

    h.pipeline.process(id).await;

    let view = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Error);
    // PROCESSING was never entered.
    assert!(view.process_start_time.is_none());
    assert!(view.process_end_time.is_some());
}

#[tokio::test]
async fn test_configured_weights_let_trained_method_run() {
    let config = AppConfig::default().with_weights(
        UpscalingMethod::Espcn,
        2,
        PathBuf::from("/weights/espcn_x2.pth"),
    );
    let h = harness(Arc::new(UpscalingStub), config).await;
    let id = h
        .pipeline
        .submit(&png_bytes(4, 4), "cat.png", UpscalingMethod::Espcn, 2)
        .await
        .unwrap();

    h.pipeline.process(id).await;

    let view = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Processed);
    assert_eq!(view.upscaled_resolution.as_deref(), Some("8x8"));
}

#[tokio::test]
async fn test_undecodable_artifact_ends_in_error() {
    let h = harness(Arc::new(GarbageStub), AppConfig::default()).await;
    let id = h
        .pipeline
        .submit(&png_bytes(8, 6), "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap();

    h.pipeline.process(id).await;

    let view = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Error);
    let job = h.store.get(id).await.unwrap().unwrap();
    assert!(job.processed_file_path.is_none());
}

#[tokio::test]
async fn test_terminal_state_snapshot_is_stable() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let id = h
        .pipeline
        .submit(&png_bytes(8, 6), "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap();
    h.pipeline.process(id).await;

    let first = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(first.status, JobStatus::Processed);

    // A second pick-up of the same job must not rerun or mutate it.
    h.pipeline.process(id).await;
    let second = h.pipeline.get_status(id).await.unwrap();
    assert_eq!(second.status, first.status);
    assert_eq!(second.upscaled_resolution, first.upscaled_resolution);
    assert_eq!(second.upscaled_file_size, first.upscaled_file_size);
    assert_eq!(second.process_end_time, first.process_end_time);
}

#[tokio::test]
async fn test_processing_state_visible_before_worker_starts() {
    let dir = TempDir::new().unwrap();
    let local = LocalArtifactStore::new(dir.path().to_path_buf());
    local.ensure_dirs().await.unwrap();
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(local);
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let job_id = Arc::new(Mutex::new(None));
    let observed = Arc::new(Mutex::new(None));
    let invoker = Arc::new(SnapshotStub {
        store: store.clone(),
        job_id: job_id.clone(),
        observed: observed.clone(),
    });

    let (tx, _queue_rx) = mpsc::channel(16);
    let pipeline = JobPipeline::new(store, artifacts, invoker, AppConfig::default(), tx);

    let id = pipeline
        .submit(&png_bytes(4, 4), "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap();
    *job_id.lock().unwrap() = Some(id);

    pipeline.process(id).await;

    // The PROCESSING transition and its start time were committed to
    // the store before the worker ran.
    let (status, start_time_set) = observed.lock().unwrap().expect("worker ran");
    assert_eq!(status, JobStatus::Processing);
    assert!(start_time_set);

    let view = pipeline.get_status(id).await.unwrap();
    assert_eq!(view.status, JobStatus::Processed);
}

#[tokio::test]
async fn test_submit_rejects_when_queue_is_full() {
    let dir = TempDir::new().unwrap();
    let local = LocalArtifactStore::new(dir.path().to_path_buf());
    local.ensure_dirs().await.unwrap();
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(local);
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    // Capacity one, nothing draining: the second submission must be
    // rejected instead of blocking.
    let (tx, _queue_rx) = mpsc::channel(1);
    let pipeline = JobPipeline::new(
        store,
        artifacts,
        Arc::new(UpscalingStub),
        AppConfig::default(),
        tx,
    );

    pipeline
        .submit(&png_bytes(4, 4), "cat.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap();
    let err = pipeline
        .submit(&png_bytes(4, 4), "dog.png", UpscalingMethod::Bicubic, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, UpscaleError::QueueFull));
}

#[tokio::test]
async fn test_get_status_unknown_job() {
    let h = harness(Arc::new(UpscalingStub), AppConfig::default()).await;
    let err = h.pipeline.get_status(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, UpscaleError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_submissions_get_distinct_jobs() {
    let h = Arc::new(harness(Arc::new(UpscalingStub), AppConfig::default()).await);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.pipeline
                .submit(&png_bytes(4, 4), "cat.png", UpscalingMethod::Bilinear, 2)
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    // Each stored original lives at its own path.
    let mut paths = Vec::new();
    for id in ids {
        let job = h.store.get(id).await.unwrap().unwrap();
        paths.push(job.original_file_path);
    }
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 8);
}
