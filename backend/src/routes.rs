use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use futures::TryStreamExt;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use crate::detection::aggregator::{AnalyzeError, DetectionAggregator};
use crate::detection::DetectionRequest;
use crate::storage::upload_store::PUBLIC_PREFIX;

const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_upload_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file supplied.")]
    MissingFile,
    #[error("Uploaded file is empty.")]
    EmptyFile,
    #[error("Unsupported file type.")]
    UnsupportedType(String),
    #[error("File too large (limit {limit} bytes).")]
    TooLarge { limit: usize },
    #[error("Failed to read upload: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("{0}")]
    Analyze(#[from] AnalyzeError),
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MissingFile
            | UploadError::EmptyFile
            | UploadError::UnsupportedType(_)
            | UploadError::Multipart(_)
            | UploadError::Analyze(AnalyzeError::EmptyContent) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Analyze(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, upload_dir: PathBuf) {
    cfg.service(web::resource("/uploadfile/").route(web::post().to(upload_file)))
        .service(web::resource("/api/analyze").route(web::post().to(upload_file)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(Files::new(&format!("/{}", PUBLIC_PREFIX), upload_dir));
}

async fn upload_file(
    aggregator: web::Data<DetectionAggregator>,
    settings: web::Data<UploadSettings>,
    payload: Multipart,
) -> Result<HttpResponse, UploadError> {
    let request = read_upload(payload, settings.max_upload_bytes).await?;
    let report = aggregator.analyze(request).await?;
    info!(
        "Returning {} provider result(s) for {}",
        report.aggregated_results.len(),
        report.filename
    );
    Ok(HttpResponse::Ok().json(report))
}

async fn health(aggregator: web::Data<DetectionAggregator>) -> HttpResponse {
    let providers: Vec<_> = aggregator
        .providers()
        .iter()
        .map(|p| json!({"name": p.name(), "configured": p.is_configured()}))
        .collect();
    HttpResponse::Ok().json(json!({"status": "ok", "providers": providers}))
}

fn is_supported_type(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type.starts_with("video/")
}

/// Reads the `file` field into memory, enforcing `max_bytes`. The declared
/// type is checked before any of the body is read. Other fields are drained.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<DetectionRequest, UploadError> {
    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        if disposition.and_then(|cd| cd.get_name()) != Some(FILE_FIELD) {
            while field.try_next().await?.is_some() {}
            continue;
        }

        let filename = disposition
            .and_then(|cd| cd.get_filename())
            .filter(|name| !name.is_empty())
            .unwrap_or("upload")
            .to_string();
        let mime_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !is_supported_type(&mime_type) {
            warn!("Rejected upload {} with type {}", filename, mime_type);
            return Err(UploadError::UnsupportedType(mime_type));
        }

        let mut content = web::BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            if content.len() + chunk.len() > max_bytes {
                return Err(UploadError::TooLarge { limit: max_bytes });
            }
            content.extend_from_slice(&chunk);
        }
        if content.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        return Ok(DetectionRequest {
            content: content.freeze(),
            filename,
            mime_type,
        });
    }

    Err(UploadError::MissingFile)
}
