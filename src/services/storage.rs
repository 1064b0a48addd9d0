use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::UploadedFile;

/// Scratch directory where uploads live for the duration of one request.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

/// An upload written to disk. The file is removed when this value is dropped,
/// whichever way the request ends.
#[derive(Debug)]
pub struct StoredUpload {
    file: NamedTempFile,
    original_name: String,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the scratch directory if it does not exist yet.
    pub fn ensure_dir(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| AppError::Internal {
            message: format!("Failed to create upload directory {}: {}", self.dir.display(), e),
        })
    }

    /// Write the upload under a generated name.
    pub async fn store(&self, upload: &UploadedFile) -> AppResult<StoredUpload> {
        let dir = self.dir.clone();
        let content = upload.content.clone();
        let original_name = upload.name.clone();

        let file = tokio::task::spawn_blocking(move || -> AppResult<NamedTempFile> {
            std::fs::create_dir_all(&dir)?;
            let mut file = Builder::new()
                .prefix(&format!("upload-{}-", Uuid::new_v4().simple()))
                .suffix(".pdf")
                .tempfile_in(&dir)
                .map_err(|e| AppError::Internal {
                    message: format!("Failed to create temporary file: {}", e),
                })?;
            file.write_all(&content).map_err(|e| AppError::Internal {
                message: format!("Failed to write PDF to temporary file: {}", e),
            })?;
            file.flush()?;
            Ok(file)
        })
        .await??;

        debug!(path = %file.path().display(), original_name = %original_name, "Upload stored");

        Ok(StoredUpload {
            file,
            original_name,
        })
    }
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Remove the file now. Failures are logged and otherwise ignored.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!(path = %path.display(), error = %e, "Failed to delete stored upload");
        } else {
            debug!(path = %path.display(), "Stored upload deleted");
        }
    }
}
