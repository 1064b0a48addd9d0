use std::env;
use std::path::PathBuf;
use anyhow::{Result, Context};
use tracing::{info, warn};

/// Rendering scale applied to every page before OCR.
pub const DEFAULT_RENDER_SCALE: f32 = 3.5;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub upload_dir: PathBuf,
    pub render_scale: f32,
    pub ocr_language: String,
    pub tesseract_path: String,
    pub tessdata_prefix: Option<PathBuf>,
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            max_file_size_mb: 50,
            upload_dir: PathBuf::from("uploads"),
            render_scale: DEFAULT_RENDER_SCALE,
            ocr_language: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            tessdata_prefix: None,
            pdfium_library_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let defaults = Config::default();
        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: {}", defaults.server_host);
                defaults.server_host.clone()
            }),
            server_port: Self::parse_env_var("PORT", defaults.server_port)
                .context("Failed to parse PORT")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            render_scale: Self::parse_env_var("RENDER_SCALE", defaults.render_scale)
                .context("Failed to parse RENDER_SCALE")?,
            ocr_language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr_language),
            tesseract_path: env::var("TESSERACT_PATH").unwrap_or(defaults.tesseract_path),
            tessdata_prefix: env::var("TESSDATA_PREFIX").ok().map(PathBuf::from),
            pdfium_library_path: env::var("PDFIUM_LIBRARY_PATH").ok().map(PathBuf::from),
        };

        config.validate()?;

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    /// Upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(anyhow::anyhow!("RENDER_SCALE must be a positive number"));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(anyhow::anyhow!("OCR_LANGUAGE must not be empty"));
        }
        Ok(())
    }
}
