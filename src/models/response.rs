use serde::{Deserialize, Serialize};

/// Separator placed between page texts in `extractedText`.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

pub const SUCCESS_MESSAGE: &str = "OCR completed successfully!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub page: usize,
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub success: bool,
    pub filename: String,
    pub total_pages: usize,
    pub extracted_text: String,
    pub pages: Vec<PageResult>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ExtractionResponse {
    pub fn new(filename: impl Into<String>, pages: Vec<PageResult>) -> Self {
        let extracted_text = join_pages(&pages);
        Self {
            success: true,
            filename: filename.into(),
            total_pages: pages.len(),
            extracted_text,
            pages,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

/// Join page texts in order with [`PAGE_BREAK`].
pub fn join_pages(pages: &[PageResult]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
