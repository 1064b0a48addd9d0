//! PDF OCR Service
//!
//! Rasterizes uploaded PDFs page by page, runs Tesseract over each page and
//! returns the text with per-page confidence. Also ships the upload client
//! that talks to the service.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{build_router, AppState, Server};
