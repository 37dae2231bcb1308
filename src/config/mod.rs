use crate::models::UpscalingMethod;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Runtime configuration for the upscaling backend.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for stored artifacts (default: ./uploads)
    pub upload_dir: PathBuf,

    /// Python interpreter used to launch the worker (default: python3)
    pub python_bin: PathBuf,

    /// Path to the upscaling worker script (default: ./scripts/upscale_image.py)
    pub worker_script: PathBuf,

    /// Number of concurrent processing workers (default: 2)
    pub worker_concurrency: usize,

    /// Capacity of the bounded processing queue (default: 64)
    pub queue_capacity: usize,

    /// Maximum upload size in bytes (default: 64 MB)
    pub max_file_size: usize,

    /// Weights file per (method, scale), loaded from
    /// WEIGHTS_PATH_{METHOD}_X{SCALE} environment entries.
    pub weights: HashMap<(UpscalingMethod, u32), PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            python_bin: PathBuf::from("python3"),
            worker_script: PathBuf::from("./scripts/upscale_image.py"),
            worker_concurrency: 2,
            queue_capacity: 64,
            max_file_size: 64 * 1024 * 1024,
            weights: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        // Any scale the environment provides is accepted; the set is
        // not restricted to a fixed list.
        let mut weights = HashMap::new();
        for (key, value) in env::vars() {
            if let Some((method, scale)) = parse_weights_key(&key) {
                weights.insert((method, scale), PathBuf::from(value));
            }
        }

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            python_bin: env::var("PYTHON_BIN")
                .map(PathBuf::from)
                .unwrap_or(default.python_bin),

            worker_script: env::var("WORKER_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(default.worker_script),

            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.worker_concurrency),

            queue_capacity: env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.queue_capacity),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            weights,
        }
    }

    /// Resolve the weights file for a trained method at the given
    /// scale. Interpolation methods never need one; for them the
    /// worker receives the literal "none" instead of a path.
    pub fn resolve_weights_path(&self, method: UpscalingMethod, scale: u32) -> Option<&Path> {
        self.weights.get(&(method, scale)).map(PathBuf::as_path)
    }

    /// Register a weights entry programmatically (tests, embedding).
    pub fn with_weights(mut self, method: UpscalingMethod, scale: u32, path: PathBuf) -> Self {
        self.weights.insert((method, scale), path);
        self
    }
}

/// Parse a `WEIGHTS_PATH_{METHOD}_X{SCALE}` key into its (method,
/// scale) pair. Malformed keys and entries for interpolation methods
/// are ignored.
fn parse_weights_key(key: &str) -> Option<(UpscalingMethod, u32)> {
    let rest = key.strip_prefix("WEIGHTS_PATH_")?;
    let (method, scale) = rest.rsplit_once("_X")?;
    let method: UpscalingMethod = method.parse().ok()?;
    if !method.needs_weights() {
        return None;
    }
    let scale: u32 = scale.parse().ok()?;
    Some((method, scale))
}
