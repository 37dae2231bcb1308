use crate::api::error::AppError;
use crate::models::{JobView, UploadResponse, UpscalingMethod};
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio_util::io::ReaderStream;
use tracing::info;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/images",
    request_body(content = Multipart, description = "Fields: file (image), model (upscaling method), scale (positive integer)"),
    responses(
        (status = 201, description = "Job created", body = UploadResponse),
        (status = 400, description = "Invalid payload, model or scale")
    )
)]
pub async fn upload_image(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut payload: Option<Vec<u8>> = None;
    let mut file_name = String::new();
    let mut method: Option<UpscalingMethod> = None;
    let mut scale: Option<u32> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                payload = Some(data.to_vec());
            }
            "model" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                method = Some(
                    text.parse::<UpscalingMethod>()
                        .map_err(AppError::BadRequest)?,
                );
            }
            "scale" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let value: u32 = text
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("invalid scale: {}", text)))?;
                scale = Some(value);
            }
            _ => {}
        }
    }

    let payload = payload.ok_or(AppError::BadRequest("missing 'file' field".to_string()))?;
    let method = method.ok_or(AppError::BadRequest("missing 'model' field".to_string()))?;
    let scale = scale.ok_or(AppError::BadRequest("missing 'scale' field".to_string()))?;

    info!(
        "received upload request: file={}, model={}, scale={}",
        file_name, method, scale
    );

    let job_id = state
        .pipeline
        .submit(&payload, &file_name, method, scale)
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse { job_id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job status snapshot", body = JobView),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job_status(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    let view = state.pipeline.get_status(id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}/result",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Processed image stream"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job not processed yet"),
        (status = 500, description = "Processed file missing")
    )
)]
pub async fn download_result(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let artifact = state.resolver.resolve(id).await?;

    let disposition = content_disposition(&artifact.download_name);
    let body = Body::from_stream(ReaderStream::new(artifact.stream));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type)
        .header(header::CONTENT_LENGTH, artifact.size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Inline disposition with an ASCII fallback and an RFC 5987 encoded
/// name for everything else.
fn content_disposition(download_name: &str) -> String {
    let ascii_name = download_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback = if ascii_name.is_empty() {
        "upscaled"
    } else {
        &ascii_name
    };
    let encoded = utf8_percent_encode(download_name, NON_ALPHANUMERIC).to_string();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
