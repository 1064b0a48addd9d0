//! Scripted stand-ins for pdfium and tesseract.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use pdf_ocr::error::{AppError, AppResult};
use pdf_ocr::services::{
    OcrEngine, OcrEngineFactory, PageImage, PageStream, Rasterizer, Recognition,
};
use pdf_ocr::{AppState, Config};

pub const BOUNDARY: &str = "pdf-ocr-test-boundary";

/// Renders `pages` blank pages, then optionally fails on the next one.
#[derive(Default)]
pub struct ScriptedRasterizer {
    pub pages: usize,
    pub fail_after: bool,
    /// Library missing: the stream yields a single `ServiceUnavailable`.
    pub unavailable: bool,
    /// (path, existed when opened) per call.
    pub opened: Mutex<Vec<(PathBuf, bool)>>,
}

impl ScriptedRasterizer {
    pub fn pages(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            ..Self::default()
        })
    }

    /// Render `ok` pages, then fail on page `ok + 1`.
    pub fn failing_at(page: usize) -> Arc<Self> {
        Arc::new(Self {
            pages: page - 1,
            fail_after: true,
            ..Self::default()
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            unavailable: true,
            ..Self::default()
        })
    }

    pub fn opened(&self) -> Vec<(PathBuf, bool)> {
        self.opened.lock().unwrap().clone()
    }
}

impl Rasterizer for ScriptedRasterizer {
    fn open(&self, path: &Path, _scale: f32) -> PageStream {
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));

        if self.unavailable {
            return PageStream::from_results(vec![Err(AppError::service_unavailable(
                "pdfium (library not found)",
            ))]);
        }

        let mut items: Vec<AppResult<PageImage>> = (1..=self.pages)
            .map(|page| {
                Ok(PageImage {
                    page,
                    image: DynamicImage::ImageRgba8(RgbaImage::new(1, 1)),
                })
            })
            .collect();
        if self.fail_after {
            items.push(Err(AppError::RasterizationFailed {
                page: self.pages + 1,
                message: "unsupported feature".to_string(),
            }));
        }
        PageStream::from_results(items)
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}

/// Returns `texts[page - 1]`, or `page N` at 50% for pages beyond the script.
#[derive(Default)]
pub struct ScriptedOcr {
    pub texts: Vec<(String, f64)>,
    pub fail_on_page: Option<usize>,
    pub fail_to_start: bool,
    pub created: AtomicUsize,
    pub terminated: AtomicUsize,
    pub recognized: AtomicUsize,
}

impl ScriptedOcr {
    pub fn with_texts(texts: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            texts: texts.iter().map(|(t, c)| (t.to_string(), *c)).collect(),
            ..Self::default()
        })
    }

    pub fn failing_on_page(page: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on_page: Some(page),
            ..Self::default()
        })
    }

    pub fn failing_to_start() -> Arc<Self> {
        Arc::new(Self {
            fail_to_start: true,
            ..Self::default()
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn recognized(&self) -> usize {
        self.recognized.load(Ordering::SeqCst)
    }
}

struct ScriptedEngine {
    script: Arc<ScriptedOcr>,
}

#[async_trait]
impl OcrEngine for ScriptedEngine {
    async fn recognize(&mut self, page: &PageImage) -> AppResult<Recognition> {
        if self.script.fail_on_page == Some(page.page) {
            return Err(AppError::ocr(format!("engine crashed on page {}", page.page)));
        }
        self.script.recognized.fetch_add(1, Ordering::SeqCst);
        let (text, confidence) = self
            .script
            .texts
            .get(page.page - 1)
            .cloned()
            .unwrap_or_else(|| (format!("page {}", page.page), 50.0));
        Ok(Recognition { text, confidence })
    }

    async fn terminate(self: Box<Self>) -> AppResult<()> {
        self.script.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handle that shares the script (and its counters) with the test.
pub struct ScriptedOcrFactory(pub Arc<ScriptedOcr>);

#[async_trait]
impl OcrEngineFactory for ScriptedOcrFactory {
    async fn create(&self, language: &str) -> AppResult<Box<dyn OcrEngine>> {
        assert_eq!(language, "eng");
        if self.0.fail_to_start {
            return Err(AppError::ocr("Tesseract OCR not available (tesseract)"));
        }
        self.0.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            script: self.0.clone(),
        }))
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub fn test_config(upload_dir: &Path) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        upload_dir: upload_dir.to_path_buf(),
        ..Config::default()
    }
}

pub fn test_state(
    upload_dir: &Path,
    rasterizer: Arc<ScriptedRasterizer>,
    ocr: Arc<ScriptedOcr>,
) -> AppState {
    AppState::new(
        test_config(upload_dir),
        rasterizer,
        Arc::new(ScriptedOcrFactory(ocr)),
    )
}

/// Multipart body with a single file part.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% scripted test document\n%%EOF\n";
