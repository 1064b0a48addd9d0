//! PDF rasterization: turn a stored PDF into a lazy sequence of page images.
//!
//! pdfium is a blocking C library, so rendering runs on a `spawn_blocking`
//! thread and hands pages over a channel of capacity one. The renderer is
//! therefore never more than one page ahead of the consumer, and dropping the
//! [`PageStream`] makes the next send fail, which stops the worker.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use pdfium_render::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// One rendered page. `page` is 1-based.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page: usize,
    pub image: DynamicImage,
}

/// Forward-only stream of rendered pages, in page order.
///
/// An `Err` item means rendering stopped at that page; nothing follows it.
#[derive(Debug)]
pub struct PageStream {
    rx: mpsc::Receiver<AppResult<PageImage>>,
}

impl PageStream {
    /// A stream plus the sender a producer feeds it through.
    pub fn channel() -> (mpsc::Sender<AppResult<PageImage>>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx })
    }

    /// A stream over already-rendered pages.
    pub fn from_results(items: Vec<AppResult<PageImage>>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            if tx.try_send(item).is_err() {
                break;
            }
        }
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<AppResult<PageImage>> {
        self.rx.recv().await
    }
}

pub trait Rasterizer: Send + Sync {
    /// Start rendering `path` at `scale`. Errors opening the document surface
    /// as the first item of the stream.
    fn open(&self, path: &Path, scale: f32) -> PageStream;

    fn is_available(&self) -> bool;
}

/// [`Rasterizer`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(library_dir: Option<&Path>) -> AppResult<Pdfium> {
        let bindings = match library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| AppError::ServiceUnavailable {
            service: format!("pdfium ({:?})", e),
        })?;

        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn open(&self, path: &Path, scale: f32) -> PageStream {
        let (tx, stream) = PageStream::channel();
        let path = path.to_path_buf();
        let library_dir = self.library_dir.clone();

        tokio::task::spawn_blocking(move || {
            render_blocking(&path, library_dir.as_deref(), scale, &tx);
        });

        stream
    }

    fn is_available(&self) -> bool {
        Self::bind(self.library_dir.as_deref()).is_ok()
    }
}

fn render_blocking(
    path: &Path,
    library_dir: Option<&Path>,
    scale: f32,
    tx: &mpsc::Sender<AppResult<PageImage>>,
) {
    let pdfium = match PdfiumRasterizer::bind(library_dir) {
        Ok(pdfium) => pdfium,
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
            return;
        }
    };

    let document = match pdfium.load_pdf_from_file(path, None) {
        Ok(document) => document,
        Err(e) => {
            let _ = tx.blocking_send(Err(AppError::RasterizationFailed {
                page: 1,
                message: format!("cannot open document: {:?}", e),
            }));
            return;
        }
    };

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    info!(pages = document.pages().len(), scale, "PDF loaded for rasterization");

    for (index, page) in document.pages().iter().enumerate() {
        let number = index + 1;
        let rendered = page
            .render_with_config(&render_config)
            .map(|bitmap| bitmap.as_image())
            .map_err(|e| AppError::RasterizationFailed {
                page: number,
                message: format!("{:?}", e),
            });

        let stop = rendered.is_err();
        if let Ok(image) = &rendered {
            debug!(page = number, width = image.width(), height = image.height(), "Rendered page");
        }

        if tx
            .blocking_send(rendered.map(|image| PageImage { page: number, image }))
            .is_err()
        {
            warn!(page = number, "Page consumer went away, stopping rasterization");
            return;
        }
        if stop {
            return;
        }
    }
}
