use bytes::Bytes;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A file received in the `pdf` multipart field, before it touches disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size: usize,
    pub content: Bytes,
    pub mime_type: Option<String>,
}

impl UploadedFile {
    pub fn new(name: String, content: Bytes) -> Self {
        let size = content.len();
        Self {
            name,
            size,
            content,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: String) -> Self {
        self.mime_type = Some(mime_type);
        self
    }

    /// Only the declared content type counts; file names and magic bytes are
    /// not consulted.
    pub fn is_pdf(&self) -> bool {
        is_pdf_mime(self.mime_type.as_deref())
    }
}

pub fn is_pdf_mime(mime_type: Option<&str>) -> bool {
    mime_type
        .map(|mt| mt.trim().eq_ignore_ascii_case(PDF_MIME_TYPE))
        .unwrap_or(false)
}
