use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of an upscaling job.
///
/// `Uploaded -> Processing -> Processed | Error`, with one extra edge
/// `Uploaded -> Error` when weights resolution fails before the worker
/// ever starts. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Processed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Uploaded => "UPLOADED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Processed => "PROCESSED",
            JobStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Supported upscaling techniques. Closed set: the worker script only
/// understands these names, passed verbatim as a positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpscalingMethod {
    Bilinear,
    Bicubic,
    Espcn,
    Edsr,
    Srgan,
}

impl UpscalingMethod {
    pub const ALL: [UpscalingMethod; 5] = [
        UpscalingMethod::Bilinear,
        UpscalingMethod::Bicubic,
        UpscalingMethod::Espcn,
        UpscalingMethod::Edsr,
        UpscalingMethod::Srgan,
    ];

    /// Pure interpolation needs no trained weights; everything else
    /// requires a configured weights file per (method, scale).
    pub fn needs_weights(&self) -> bool {
        !matches!(self, UpscalingMethod::Bilinear | UpscalingMethod::Bicubic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpscalingMethod::Bilinear => "BILINEAR",
            UpscalingMethod::Bicubic => "BICUBIC",
            UpscalingMethod::Espcn => "ESPCN",
            UpscalingMethod::Edsr => "EDSR",
            UpscalingMethod::Srgan => "SRGAN",
        }
    }
}

impl fmt::Display for UpscalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpscalingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BILINEAR" => Ok(UpscalingMethod::Bilinear),
            "BICUBIC" => Ok(UpscalingMethod::Bicubic),
            "ESPCN" => Ok(UpscalingMethod::Espcn),
            "EDSR" => Ok(UpscalingMethod::Edsr),
            "SRGAN" => Ok(UpscalingMethod::Srgan),
            other => Err(format!("unknown upscaling method: {}", other)),
        }
    }
}

/// One upload-to-result processing unit. Mutated only by the job
/// pipeline; everything handed to readers is a cloned snapshot.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub original_file_name: String,
    pub original_file_path: PathBuf,
    pub processed_file_path: Option<PathBuf>,
    pub status: JobStatus,
    pub upload_time: DateTime<Utc>,
    pub process_start_time: Option<DateTime<Utc>>,
    pub process_end_time: Option<DateTime<Utc>>,
    pub method: UpscalingMethod,
    pub scale: u32,
    pub original_resolution: String,
    pub upscaled_resolution: Option<String>,
    pub original_file_size: u64,
    pub upscaled_file_size: Option<u64>,
}

impl Job {
    pub fn new(
        id: Uuid,
        original_file_name: String,
        original_file_path: PathBuf,
        method: UpscalingMethod,
        scale: u32,
        original_resolution: String,
        original_file_size: u64,
    ) -> Self {
        Self {
            id,
            original_file_name,
            original_file_path,
            processed_file_path: None,
            status: JobStatus::Uploaded,
            upload_time: Utc::now(),
            process_start_time: None,
            process_end_time: None,
            method,
            scale,
            original_resolution,
            upscaled_resolution: None,
            original_file_size,
            upscaled_file_size: None,
        }
    }
}

/// Pixel dimensions and byte size captured by the metadata inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

impl ImageInfo {
    /// `"WxH"` string stored on the job record.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub job_id: Uuid,
}

/// Immutable snapshot of a job returned by the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub original_file_name: String,
    pub method: UpscalingMethod,
    pub scale: u32,
    pub original_resolution: String,
    pub upscaled_resolution: Option<String>,
    pub original_file_size: u64,
    pub upscaled_file_size: Option<u64>,
    pub upload_time: DateTime<Utc>,
    pub process_start_time: Option<DateTime<Utc>>,
    pub process_end_time: Option<DateTime<Utc>>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            original_file_name: job.original_file_name.clone(),
            method: job.method,
            scale: job.scale,
            original_resolution: job.original_resolution.clone(),
            upscaled_resolution: job.upscaled_resolution.clone(),
            original_file_size: job.original_file_size,
            upscaled_file_size: job.upscaled_file_size,
            upload_time: job.upload_time,
            process_start_time: job.process_start_time,
            process_end_time: job.process_end_time,
        }
    }
}
