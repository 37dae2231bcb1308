use crate::services::pipeline::JobPipeline;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// Pool of processing workers draining the bounded job queue. Each
/// dequeued job runs in its own spawned task so a panic inside one job
/// cannot take a worker down or leave the job stuck in PROCESSING.
pub struct ProcessingPool {
    pipeline: Arc<JobPipeline>,
    queue: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    shutdown: watch::Receiver<bool>,
}

impl ProcessingPool {
    pub fn new(
        pipeline: Arc<JobPipeline>,
        queue: mpsc::Receiver<Uuid>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pipeline,
            queue: Arc::new(Mutex::new(queue)),
            shutdown,
        }
    }

    /// Spawn `workers` tasks that run until the queue closes or a
    /// shutdown is signalled.
    pub fn spawn(self, workers: usize) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let pipeline = self.pipeline.clone();
            let queue = self.queue.clone();
            let mut shutdown = self.shutdown.clone();

            handles.push(tokio::spawn(async move {
                info!("processing worker {} started", worker_id);
                loop {
                    let job_id = tokio::select! {
                        _ = shutdown.changed() => {
                            info!("processing worker {} shutting down", worker_id);
                            break;
                        }
                        job = async { queue.lock().await.recv().await } => match job {
                            Some(id) => id,
                            None => break,
                        },
                    };

                    Self::run_one(&pipeline, job_id).await;
                }
            }));
        }
        handles
    }

    /// Run a single job to its terminal state. `process` handles every
    /// error internally; a panic surfaces here as a join error and the
    /// job is still driven to ERROR.
    async fn run_one(pipeline: &Arc<JobPipeline>, job_id: Uuid) {
        let task_pipeline = pipeline.clone();
        let handle = tokio::spawn(async move { task_pipeline.process(job_id).await });
        if let Err(join_err) = handle.await {
            error!("processing task for job {} panicked: {}", job_id, join_err);
            pipeline.mark_error(job_id).await;
        }
    }
}
