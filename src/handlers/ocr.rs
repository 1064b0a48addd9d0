use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::HeaderMap,
    response::Json,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::REQUEST_ID_HEADER;
use crate::models::{is_pdf_mime, ExtractionResponse, UploadedFile};
use crate::server::AppState;

/// Multipart field carrying the PDF.
pub const PDF_FIELD: &str = "pdf";

pub async fn ocr_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ExtractionResponse>> {
    let start = Instant::now();
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()[..8].to_string());

    info!(request_id = %request_id, "Starting PDF OCR request");

    let mut multipart = multipart.map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Request is not multipart");
        AppError::MissingFile
    })?;

    let file = match extract_pdf_from_multipart(&mut multipart, state.config.max_file_size_mb).await {
        Ok(file) => {
            info!(
                request_id = %request_id,
                file_name = %file.name,
                file_size = file.size,
                "File extracted from multipart form"
            );
            file
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Upload rejected");
            return Err(e);
        }
    };

    let stored = state.store.store(&file).await?;
    let result = state.pipeline.run(stored.path(), &request_id).await;
    stored.discard();

    let pages = match result {
        Ok(pages) => pages,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "OCR Error");
            return Err(e);
        }
    };

    let response = ExtractionResponse::new(file.name, pages);

    info!(
        request_id = %request_id,
        total_pages = response.total_pages,
        text_length = response.extracted_text.len(),
        total_time_ms = start.elapsed().as_millis() as u64,
        "Sending response"
    );

    Ok(Json(response))
}

async fn extract_pdf_from_multipart(
    multipart: &mut Multipart,
    max_file_size_mb: usize,
) -> AppResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PDF_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());

        // Reject before reading the body so nothing is buffered or stored.
        if !is_pdf_mime(content_type.as_deref()) {
            return Err(AppError::invalid_file("Only PDF allowed"));
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AppError::MissingFile);
        }

        let max_size_bytes = max_file_size_mb * 1024 * 1024;
        if data.len() > max_size_bytes {
            return Err(AppError::FileTooLarge {
                size: data.len() / (1024 * 1024),
                limit: max_file_size_mb,
            });
        }

        let file = UploadedFile::new(file_name, data);
        let file = match content_type {
            Some(mime_type) => file.with_mime_type(mime_type),
            None => file,
        };

        debug!(
            "Extracted file: {} ({} bytes, type: {:?})",
            file.name,
            file.size,
            file.mime_type
        );

        return Ok(file);
    }

    Err(AppError::MissingFile)
}
