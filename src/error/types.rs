use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No PDF uploaded")]
    MissingFile,

    #[error("{message}")]
    InvalidFile { message: String },

    #[error("File too large: {size}MB exceeds limit of {limit}MB")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Request body exceeds the upload limit")]
    PayloadTooLarge,

    #[error("PDF conversion stopped at page {page}: {message}")]
    RasterizationFailed { page: usize, message: String },

    #[error("No pages could be processed")]
    NoPagesProcessed,

    #[error("{message}")]
    OcrError { message: String },

    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingFile => "MISSING_FILE",
            AppError::InvalidFile { .. } => "INVALID_FILE",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AppError::RasterizationFailed { .. } => "RASTERIZATION_FAILED",
            AppError::NoPagesProcessed => "NO_PAGES_PROCESSED",
            AppError::OcrError { .. } => "OCR_ERROR",
            AppError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            AppError::ConfigError { .. } => "CONFIG_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::InvalidFile { .. } => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RasterizationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NoPagesProcessed => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::OcrError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing body. Input errors carry their own message, everything
    /// that fails once processing has started is reported as "OCR failed"
    /// with the underlying message in `details`.
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            AppError::MissingFile
            | AppError::InvalidFile { .. }
            | AppError::FileTooLarge { .. }
            | AppError::PayloadTooLarge => ErrorResponse::new(self.to_string()),
            AppError::ServiceUnavailable { .. } => ErrorResponse::new(self.to_string()),
            _ => ErrorResponse::new("OCR failed").with_details(self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = %status,
            error_message = %message,
            "API error occurred"
        );

        (status, Json(self.to_error_response())).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal {
            message: format!("Background task failed: {}", err),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::InvalidFile {
                message: format!("Failed to read multipart field: {}", err.body_text()),
            }
        }
    }
}

impl AppError {
    pub fn invalid_file(message: impl Into<String>) -> Self {
        AppError::InvalidFile {
            message: message.into(),
        }
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        AppError::OcrError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::ConfigError {
            message: message.into(),
        }
    }

    pub fn service_unavailable(service: impl Into<String>) -> Self {
        AppError::ServiceUnavailable {
            service: service.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}
