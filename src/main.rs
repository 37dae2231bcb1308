use clap::Parser;
use dotenvy::dotenv;
use rust_upscale_backend::config::AppConfig;
use rust_upscale_backend::infrastructure::artifact_store::{ArtifactStore, LocalArtifactStore};
use rust_upscale_backend::infrastructure::job_store::{InMemoryJobStore, JobStore};
use rust_upscale_backend::services::invoker::{PythonWorkerInvoker, WorkerInvoker};
use rust_upscale_backend::services::pipeline::JobPipeline;
use rust_upscale_backend::services::resolver::ResultResolver;
use rust_upscale_backend::services::worker::ProcessingPool;
use rust_upscale_backend::{create_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Override the number of processing workers
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_upscale_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust Upscale Backend...");

    let config = AppConfig::from_env();
    let workers = args.workers.unwrap_or(config.worker_concurrency);
    info!(
        "⚙️  Config: upload_dir={:?}, workers={}, queue={}, weights entries={}",
        config.upload_dir,
        workers,
        config.queue_capacity,
        config.weights.len()
    );

    let local_store = LocalArtifactStore::new(config.upload_dir.clone());
    local_store.ensure_dirs().await?;
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(local_store);

    let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let invoker: Arc<dyn WorkerInvoker> = Arc::new(PythonWorkerInvoker::new(
        config.python_bin.clone(),
        config.worker_script.clone(),
    ));

    let (queue_tx, queue_rx) = tokio::sync::mpsc::channel(config.queue_capacity);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let pipeline = Arc::new(JobPipeline::new(
        job_store.clone(),
        artifacts.clone(),
        invoker,
        config.clone(),
        queue_tx,
    ));

    let pool = ProcessingPool::new(pipeline.clone(), queue_rx, shutdown_rx);
    let worker_handles = pool.spawn(workers);
    info!("👷 {} processing workers started", workers);

    let resolver = Arc::new(ResultResolver::new(job_store, artifacts));

    let state = AppState {
        pipeline,
        resolver,
        config,
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API server listening on http://0.0.0.0:{}", args.port);
    info!(
        "📖 Swagger UI: http://localhost:{}/swagger-ui",
        args.port
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("🛑 Shutting down processing workers...");
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
