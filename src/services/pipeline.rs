use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::PageResult;
use crate::services::ocr_service::{OcrEngine, OcrEngineFactory};
use crate::services::rasterizer::Rasterizer;

/// Rasterize a stored PDF and recognise its pages one after another.
#[derive(Clone)]
pub struct OcrPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    engines: Arc<dyn OcrEngineFactory>,
    render_scale: f32,
    language: String,
}

impl OcrPipeline {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        engines: Arc<dyn OcrEngineFactory>,
        render_scale: f32,
        language: impl Into<String>,
    ) -> Self {
        Self {
            rasterizer,
            engines,
            render_scale,
            language: language.into(),
        }
    }

    pub fn from_config(
        config: &Config,
        rasterizer: Arc<dyn Rasterizer>,
        engines: Arc<dyn OcrEngineFactory>,
    ) -> Self {
        Self::new(rasterizer, engines, config.render_scale, config.ocr_language.clone())
    }

    pub fn rasterizer(&self) -> &dyn Rasterizer {
        self.rasterizer.as_ref()
    }

    pub fn engines(&self) -> &dyn OcrEngineFactory {
        self.engines.as_ref()
    }

    /// Run OCR over every page that renders.
    ///
    /// A page that fails to render ends the page sequence but keeps the pages
    /// already recognised. A recognition error, or a rasterizer that cannot
    /// start at all, fails the whole run. The engine is
    /// terminated before this returns, on every path.
    pub async fn run(&self, pdf_path: &Path, request_id: &str) -> AppResult<Vec<PageResult>> {
        let start = Instant::now();
        let mut engine = self.engines.create(&self.language).await?;

        let outcome = self.recognize_pages(engine.as_mut(), pdf_path, request_id).await;

        if let Err(e) = engine.terminate().await {
            warn!(request_id = %request_id, error = %e, "OCR engine did not terminate cleanly");
        }

        let pages = outcome?;
        info!(
            request_id = %request_id,
            total_pages = pages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Total pages processed"
        );

        if pages.is_empty() {
            return Err(AppError::NoPagesProcessed);
        }
        Ok(pages)
    }

    async fn recognize_pages(
        &self,
        engine: &mut dyn OcrEngine,
        pdf_path: &Path,
        request_id: &str,
    ) -> AppResult<Vec<PageResult>> {
        let mut pages: Vec<PageResult> = Vec::new();
        let mut stream = self.rasterizer.open(pdf_path, self.render_scale);

        while let Some(item) = stream.next().await {
            let page_number = pages.len() + 1;
            let image = match item {
                Ok(image) => image,
                Err(e @ AppError::RasterizationFailed { .. }) => {
                    warn!(
                        request_id = %request_id,
                        page = page_number,
                        error = %e,
                        "PDF conversion stopped, continuing with pages processed so far"
                    );
                    break;
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "PDF rasterizer unavailable");
                    return Err(AppError::ocr(e.to_string()));
                }
            };

            info!(request_id = %request_id, page = page_number, "Processing page {}...", page_number);

            let recognition = engine.recognize(&image).await.map_err(|e| {
                error!(request_id = %request_id, page = page_number, error = %e, "OCR failed");
                e
            })?;

            info!(
                request_id = %request_id,
                page = page_number,
                confidence = recognition.confidence,
                "Page {} OCR done - Confidence: {:.2}%",
                page_number,
                recognition.confidence
            );

            pages.push(PageResult {
                page: page_number,
                text: recognition.text,
                confidence: recognition.confidence,
            });
        }

        Ok(pages)
    }
}
