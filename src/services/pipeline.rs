use crate::config::AppConfig;
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::job_store::JobStore;
use crate::models::{Job, JobStatus, JobView, UpscalingMethod};
use crate::services::error::UpscaleError;
use crate::services::inspector::MetadataInspector;
use crate::services::invoker::WorkerInvoker;
use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrates the job lifecycle: persists uploads, schedules the
/// asynchronous processing task, drives status transitions, and
/// reconciles worker outcomes back into the job store.
pub struct JobPipeline {
    store: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    invoker: Arc<dyn WorkerInvoker>,
    config: AppConfig,
    queue: mpsc::Sender<Uuid>,
}

impl JobPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        invoker: Arc<dyn WorkerInvoker>,
        config: AppConfig,
        queue: mpsc::Sender<Uuid>,
    ) -> Self {
        Self {
            store,
            artifacts,
            invoker,
            config,
            queue,
        }
    }

    /// Accept an upload and schedule exactly one processing task for
    /// it. Returns the new job id without waiting for processing; the
    /// job is observable in UPLOADED state as soon as this returns.
    /// Never waits on downstream workers: a full queue is rejected
    /// with `QueueFull` instead of blocking the caller.
    pub async fn submit(
        &self,
        payload: &[u8],
        file_name: &str,
        method: UpscalingMethod,
        scale: u32,
    ) -> Result<Uuid, UpscaleError> {
        if payload.is_empty() || file_name.trim().is_empty() {
            return Err(UpscaleError::InvalidPayload(
                "uploaded file is empty or has no name".to_string(),
            ));
        }
        if scale == 0 {
            return Err(UpscaleError::InvalidPayload(
                "scale must be a positive integer".to_string(),
            ));
        }

        let info = MetadataInspector::inspect_bytes(payload)?;
        let original_path = self.artifacts.write(file_name, payload).await?;

        let job_id = Uuid::new_v4();
        let job = Job::new(
            job_id,
            file_name.to_string(),
            original_path,
            method,
            scale,
            info.resolution(),
            info.size_bytes,
        );
        self.store.put(job).await?;

        self.queue.try_send(job_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => UpscaleError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                UpscaleError::Storage(anyhow!("processing queue is closed"))
            }
        })?;

        info!(
            "job {} submitted ({} {} x{}, {})",
            job_id,
            file_name,
            method,
            scale,
            info.resolution()
        );
        Ok(job_id)
    }

    /// Immutable snapshot of the job's current fields. Never blocks on
    /// in-flight processing.
    pub async fn get_status(&self, job_id: Uuid) -> Result<JobView, UpscaleError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or(UpscaleError::NotFound(job_id))?;
        Ok(JobView::from(&job))
    }

    /// Drive one job from UPLOADED to a terminal state. Runs inside an
    /// asynchronous worker task, once per submission. Every failure
    /// path lands in ERROR; nothing propagates out of here.
    pub async fn process(&self, job_id: Uuid) {
        match self.run_job(job_id).await {
            Ok(()) => info!("job {} processing successful", job_id),
            Err(e) => {
                error!("failed to process job {}: {}", job_id, e);
                self.mark_error(job_id).await;
            }
        }
    }

    async fn run_job(&self, job_id: Uuid) -> Result<(), UpscaleError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or(UpscaleError::NotFound(job_id))?;

        if job.status != JobStatus::Uploaded {
            warn!(
                "job {} already picked up (status {}), skipping",
                job_id, job.status
            );
            return Ok(());
        }

        // Pre-flight: a trained method without configured weights
        // fails before PROCESSING is ever recorded.
        let weights_path = if job.method.needs_weights() {
            let path = self
                .config
                .resolve_weights_path(job.method, job.scale)
                .ok_or(UpscaleError::ConfigurationMissing {
                    method: job.method,
                    scale: job.scale,
                })?;
            Some(path.to_path_buf())
        } else {
            None
        };

        let processed_path =
            self.artifacts
                .processed_path(job_id, &job.original_file_path, job.method, job.scale);

        // The PROCESSING transition must be visible to status readers
        // before the worker is launched.
        self.store
            .update(
                job_id,
                Box::new(|j| {
                    j.status = JobStatus::Processing;
                    j.process_start_time = Some(Utc::now());
                }),
            )
            .await?
            .ok_or(UpscaleError::NotFound(job_id))?;

        let exit_code = self
            .invoker
            .invoke(
                &job.original_file_path,
                &processed_path,
                weights_path.as_deref(),
                job.method,
                job.scale,
            )
            .await?;

        if exit_code != 0 {
            return Err(UpscaleError::WorkerFailure(exit_code));
        }

        // Exit code zero alone is not enough: the artifact must exist
        // and decode as an image.
        let info = MetadataInspector::inspect(&processed_path).await?;

        self.store
            .update(
                job_id,
                Box::new(move |j| {
                    j.processed_file_path = Some(processed_path);
                    j.upscaled_resolution = Some(info.resolution());
                    j.upscaled_file_size = Some(info.size_bytes);
                    j.status = JobStatus::Processed;
                    j.process_end_time = Some(Utc::now());
                }),
            )
            .await?
            .ok_or(UpscaleError::NotFound(job_id))?;

        Ok(())
    }

    /// Record the terminal ERROR state. Valid from UPLOADED as well as
    /// PROCESSING; never leaves a terminal state. A store failure here
    /// is logged and swallowed so the worker task's host survives.
    pub async fn mark_error(&self, job_id: Uuid) {
        let result = self
            .store
            .update(
                job_id,
                Box::new(|j| {
                    if !j.status.is_terminal() {
                        j.status = JobStatus::Error;
                        j.process_end_time = Some(Utc::now());
                    }
                }),
            )
            .await;

        match result {
            Ok(Some(_)) => info!("job {} marked as ERROR", job_id),
            Ok(None) => error!("cannot mark unknown job {} as ERROR", job_id),
            Err(e) => error!("failed to record ERROR state for job {}: {}", job_id, e),
        }
    }
}
