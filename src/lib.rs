pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;

use crate::config::AppConfig;
use crate::services::pipeline::JobPipeline;
use crate::services::resolver::ResultResolver;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::images::upload_image,
        api::handlers::images::get_job_status,
        api::handlers::images::download_result,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::UploadResponse,
            models::JobView,
            models::JobStatus,
            models::UpscalingMethod,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "images", description = "Image upscaling job endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<JobPipeline>,
    pub resolver: Arc<ResultResolver>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/v1/images",
            post(api::handlers::images::upload_image).layer(
                axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 1024 * 1024, // multipart overhead
                ),
            ),
        )
        .route(
            "/api/v1/images/:id/status",
            get(api::handlers::images::get_job_status),
        )
        .route(
            "/api/v1/images/:id/result",
            get(api::handlers::images::download_result),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
