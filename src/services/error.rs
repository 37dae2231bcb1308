use crate::models::{JobStatus, UpscalingMethod};
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for the upscaling pipeline.
///
/// Errors raised during the synchronous part of a submission surface
/// directly to the caller; everything that happens inside the
/// asynchronous processing task is folded into the job's terminal
/// ERROR state and only observable through status/result queries.
#[derive(Error, Debug)]
pub enum UpscaleError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("processing queue is full, retry later")]
    QueueFull,

    #[error("model weights not configured for {method} at scale {scale}")]
    ConfigurationMissing {
        method: UpscalingMethod,
        scale: u32,
    },

    #[error("failed to launch upscaling worker: {0}")]
    LaunchFailure(#[source] std::io::Error),

    #[error("upscaling worker exited with code {0}")]
    WorkerFailure(i32),

    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("job {id} is not processed yet (current status: {status})")]
    NotReady { id: Uuid, status: JobStatus },

    #[error("processed artifact is missing for job {0}")]
    ArtifactMissing(Uuid),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
