//! Upload client for the OCR service.
//!
//! [`UploadClient`] holds at most one pending file. Submitting posts it as
//! the `pdf` multipart field and renders the reply as either extracted text
//! or a saved archive, then clears the selection whatever happened.
//!
//! Archive replies (a raw `application/zip` body, or a `downloadZip` data URI
//! in the JSON) come from an older ZIP-producing backend. They are only
//! honoured with [`ClientOptions::legacy_archives`] set.

use std::path::{Path, PathBuf};

use base64::{prelude::BASE64_STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, multipart};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::PDF_MIME_TYPE;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/ocr";
pub const NO_FILE_MESSAGE: &str = "Please select a PDF first!";
const FALLBACK_ERROR: &str = "Conversion failed";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Server(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cannot save download: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed archive data URI")]
    InvalidArchive,

    #[error("server sent an archive but legacy archive support is off")]
    ArchiveNotAccepted,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub endpoint: String,
    pub download_dir: PathBuf,
    pub legacy_archives: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            download_dir: PathBuf::from("."),
            legacy_archives: false,
        }
    }
}

/// A file chosen by the user, not yet sent.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        Ok(Self::new(name, content))
    }

    pub fn size_mb(&self) -> f64 {
        self.content.len() as f64 / 1024.0 / 1024.0
    }

    /// File name without a trailing `.pdf`, any case.
    pub fn stem(&self) -> &str {
        let len = self.name.len();
        if len >= 4 && self.name.is_char_boundary(len - 4) && self.name[len - 4..].eq_ignore_ascii_case(".pdf") {
            &self.name[..len - 4]
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    FileSelected,
    Uploading,
    Done,
}

/// JSON reply, success or failure. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Reply {
    success: bool,
    #[serde(alias = "text")]
    extracted_text: Option<String>,
    total_pages: Option<usize>,
    error: Option<String>,
    message: Option<String>,
    download_zip: Option<String>,
}

struct Rendered {
    message: String,
    extracted_text: Option<String>,
    download: Option<PathBuf>,
}

pub struct UploadClient {
    http: reqwest::Client,
    options: ClientOptions,
    file: Option<PendingFile>,
    loading: bool,
    message: String,
    progress: u8,
    extracted_text: String,
    download: Option<PathBuf>,
}

impl UploadClient {
    pub fn new(options: ClientOptions) -> Self {
        Self::with_http(reqwest::Client::new(), options)
    }

    pub fn with_http(http: reqwest::Client, options: ClientOptions) -> Self {
        Self {
            http,
            options,
            file: None,
            loading: false,
            message: String::new(),
            progress: 0,
            extracted_text: String::new(),
            download: None,
        }
    }

    pub fn state(&self) -> ClientState {
        if self.loading {
            ClientState::Uploading
        } else if self.file.is_some() {
            ClientState::FileSelected
        } else if !self.message.is_empty() {
            ClientState::Done
        } else {
            ClientState::Idle
        }
    }

    /// Replace the pending file and forget the previous outcome.
    pub fn select_file(&mut self, file: PendingFile) {
        self.file = Some(file);
        self.message.clear();
        self.progress = 0;
        self.extracted_text.clear();
        self.download = None;
    }

    pub fn selected_file(&self) -> Option<&PendingFile> {
        self.file.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn extracted_text(&self) -> &str {
        &self.extracted_text
    }

    pub fn download(&self) -> Option<&Path> {
        self.download.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.message.starts_with("Error:")
    }

    /// Send the pending file. Without one, only the validation message is set.
    pub async fn submit(&mut self) {
        let Some(file) = self.file.clone() else {
            self.message = NO_FILE_MESSAGE.to_string();
            return;
        };

        self.loading = true;
        self.message.clear();
        self.progress = 0;

        match self.upload(&file).await {
            Ok(rendered) => {
                self.message = rendered.message;
                if let Some(text) = rendered.extracted_text {
                    self.extracted_text = text;
                }
                self.download = rendered.download;
                self.progress = 100;
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "Upload failed");
                self.message = format!("Error: {}", e);
            }
        }

        self.loading = false;
        self.file = None;
    }

    async fn upload(&self, file: &PendingFile) -> Result<Rendered, ClientError> {
        let part = multipart::Part::bytes(file.content.clone())
            .file_name(file.name.clone())
            .mime_str(PDF_MIME_TYPE)?;
        let form = multipart::Form::new().part("pdf", part);

        info!(endpoint = %self.options.endpoint, file = %file.name, "Uploading PDF");
        let response = self
            .http
            .post(&self.options.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reply: Reply = response.json().await.unwrap_or_default();
            let message = reply
                .error
                .or(reply.message)
                .unwrap_or_else(|| FALLBACK_ERROR.to_string());
            return Err(ClientError::Server(message));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("application/zip") {
            if !self.options.legacy_archives {
                return Err(ClientError::ArchiveNotAccepted);
            }
            let archive = response.bytes().await?;
            let path = self
                .save_archive(&format!("{}-images.zip", file.stem()), &archive)
                .await?;
            return Ok(Rendered {
                message: format!("Success! {} → ZIP downloaded", file.name),
                extracted_text: None,
                download: Some(path),
            });
        }

        let reply: Reply = response.json().await?;
        debug!(success = reply.success, total_pages = ?reply.total_pages, "Backend response");

        if !reply.success {
            return Err(ClientError::Server(
                reply.error.unwrap_or_else(|| FALLBACK_ERROR.to_string()),
            ));
        }

        let message = match reply.total_pages {
            Some(pages) if pages > 0 => format!("Extracted text from {} pages!", pages),
            _ => format!("Extracted text from {}", file.name),
        };

        let download = match reply.download_zip.as_deref() {
            Some(data_uri) if self.options.legacy_archives => {
                let archive = decode_data_uri(data_uri)?;
                let name = format!("{}-ocr-images.zip", file.stem());
                Some(self.save_archive(&name, &archive).await?)
            }
            Some(_) => {
                debug!("Ignoring downloadZip field, legacy archive support is off");
                None
            }
            None => None,
        };

        Ok(Rendered {
            message,
            extracted_text: Some(reply.extracted_text.unwrap_or_default()),
            download,
        })
    }

    async fn save_archive(&self, name: &str, data: &[u8]) -> Result<PathBuf, ClientError> {
        tokio::fs::create_dir_all(&self.options.download_dir).await?;
        let path = self.options.download_dir.join(name);
        tokio::fs::write(&path, data).await?;
        info!(path = %path.display(), bytes = data.len(), "Archive downloaded");
        Ok(path)
    }
}

/// Decode a `data:<mime>;base64,<payload>` URI.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ClientError> {
    let (_, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or(ClientError::InvalidArchive)?;
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|_| ClientError::InvalidArchive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_strips_pdf_extension_case_insensitively() {
        assert_eq!(PendingFile::new("report.PDF", vec![]).stem(), "report");
        assert_eq!(PendingFile::new("scan.pdf", vec![]).stem(), "scan");
        assert_eq!(PendingFile::new("notes.txt", vec![]).stem(), "notes.txt");
        assert_eq!(PendingFile::new("pdf", vec![]).stem(), "pdf");
    }

    #[test]
    fn test_decode_data_uri() {
        assert_eq!(
            decode_data_uri("data:application/zip;base64,UEsFBg==").unwrap(),
            vec![0x50, 0x4b, 0x05, 0x06]
        );
        assert!(matches!(
            decode_data_uri("application/zip;base64,UEsFBg=="),
            Err(ClientError::InvalidArchive)
        ));
        assert!(matches!(
            decode_data_uri("data:application/zip;base64,!!!"),
            Err(ClientError::InvalidArchive)
        ));
    }

    #[test]
    fn test_selecting_a_file_clears_previous_outcome() {
        let mut client = UploadClient::new(ClientOptions::default());
        client.message = "Error: boom".to_string();
        client.progress = 100;
        client.extracted_text = "old".to_string();

        client.select_file(PendingFile::new("a.pdf", b"%PDF-1.4".to_vec()));

        assert_eq!(client.state(), ClientState::FileSelected);
        assert!(client.message().is_empty());
        assert_eq!(client.progress(), 0);
        assert!(client.extracted_text().is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_file_does_not_touch_the_network() {
        let mut client = UploadClient::new(ClientOptions {
            endpoint: "http://127.0.0.1:9/never".to_string(),
            ..ClientOptions::default()
        });
        assert_eq!(client.state(), ClientState::Idle);

        client.submit().await;

        assert_eq!(client.message(), NO_FILE_MESSAGE);
        assert_eq!(client.state(), ClientState::Done);
    }
}
