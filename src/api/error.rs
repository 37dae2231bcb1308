use crate::services::error::UpscaleError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<UpscaleError> for AppError {
    fn from(err: UpscaleError) -> Self {
        match err {
            UpscaleError::InvalidPayload(msg) => AppError::BadRequest(msg),
            UpscaleError::NotFound(id) => AppError::NotFound(format!("job not found: {}", id)),
            UpscaleError::NotReady { id, status } => AppError::Conflict(format!(
                "job {} is not processed yet (current status: {})",
                id, status
            )),
            UpscaleError::QueueFull => AppError::Unavailable(err.to_string()),
            UpscaleError::ArtifactMissing(id) => {
                AppError::Internal(format!("processed file is missing for job {}", id))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use uuid::Uuid;

    #[test]
    fn test_error_kind_mapping() {
        let id = Uuid::new_v4();
        assert!(matches!(
            AppError::from(UpscaleError::InvalidPayload("x".into())),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(UpscaleError::NotFound(id)),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(UpscaleError::NotReady {
                id,
                status: JobStatus::Uploaded
            }),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(UpscaleError::ArtifactMissing(id)),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(UpscaleError::WorkerFailure(2)),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(UpscaleError::QueueFull),
            AppError::Unavailable(_)
        ));
    }
}
