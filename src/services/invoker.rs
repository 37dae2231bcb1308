use crate::models::UpscalingMethod;
use crate::services::error::UpscaleError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Weights argument handed to the worker: interpolation methods get
/// the literal "none" instead of a path.
const NO_WEIGHTS: &str = "none";

/// Launches the external upscaling worker and reports its exit code.
/// Exit code 0 means success; anything else is a worker failure. A
/// process that cannot be started at all is a distinct launch failure.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke(
        &self,
        original_path: &Path,
        processed_path: &Path,
        weights_path: Option<&Path>,
        method: UpscalingMethod,
        scale: u32,
    ) -> Result<i32, UpscaleError>;
}

/// Runs the Python upscaling script as a subprocess with the fixed
/// positional argument contract:
/// `original processed weights method scale`.
pub struct PythonWorkerInvoker {
    python_bin: PathBuf,
    script: PathBuf,
}

impl PythonWorkerInvoker {
    pub fn new(python_bin: PathBuf, script: PathBuf) -> Self {
        Self { python_bin, script }
    }
}

#[async_trait]
impl WorkerInvoker for PythonWorkerInvoker {
    async fn invoke(
        &self,
        original_path: &Path,
        processed_path: &Path,
        weights_path: Option<&Path>,
        method: UpscalingMethod,
        scale: u32,
    ) -> Result<i32, UpscaleError> {
        let weights_arg = weights_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| NO_WEIGHTS.to_string());

        let mut child = Command::new(&self.python_bin)
            .arg(&self.script)
            .arg(original_path)
            .arg(processed_path)
            .arg(&weights_arg)
            .arg(method.as_str())
            .arg(scale.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(UpscaleError::LaunchFailure)?;

        // Drain both pipes while the worker runs so it can never block
        // on a full pipe buffer. The combined output is diagnostics
        // only, not part of the contract.
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let drain = async {
            let mut combined = String::new();
            if let Some(out) = stdout.as_mut() {
                let _ = out.read_to_string(&mut combined).await;
            }
            if let Some(err) = stderr.as_mut() {
                let _ = err.read_to_string(&mut combined).await;
            }
            combined
        };

        let (status, combined) = tokio::join!(child.wait(), drain);
        let status = status.map_err(UpscaleError::LaunchFailure)?;

        for line in combined.lines() {
            debug!("worker output: {}", line);
        }

        // A signal-killed worker has no exit code; collapse it into
        // the nonzero-exit failure path.
        let code = status.code().unwrap_or(-1);
        info!(
            "upscaling worker finished with exit code {} ({} x{})",
            code, method, scale
        );
        Ok(code)
    }
}
