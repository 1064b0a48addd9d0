pub mod ocr_service;
pub mod pipeline;
pub mod rasterizer;
pub mod storage;

pub use ocr_service::{OcrEngine, OcrEngineFactory, Recognition, TesseractEngine, TesseractFactory};
pub use pipeline::OcrPipeline;
pub use rasterizer::{PageImage, PageStream, PdfiumRasterizer, Rasterizer};
pub use storage::{StoredUpload, UploadStore};
