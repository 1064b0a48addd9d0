use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::rasterizer::PageImage;

/// Text and mean confidence recognised on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f64,
}

/// A live OCR engine. One instance serves one request and must be
/// terminated before that request answers.
#[async_trait]
pub trait OcrEngine: Send {
    async fn recognize(&mut self, page: &PageImage) -> AppResult<Recognition>;

    async fn terminate(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    async fn create(&self, language: &str) -> AppResult<Box<dyn OcrEngine>>;

    fn is_available(&self) -> bool;
}

/// Starts [`TesseractEngine`]s using the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractFactory {
    binary: String,
    tessdata_prefix: Option<PathBuf>,
    version: Arc<OnceCell<String>>,
}

impl TesseractFactory {
    pub fn new(binary: impl Into<String>, tessdata_prefix: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            tessdata_prefix,
            version: Arc::new(OnceCell::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tesseract_path.clone(), config.tessdata_prefix.clone())
    }

    /// Version string reported by this factory's binary. Only a successful
    /// probe is remembered; a missing binary is probed again next time.
    async fn version(&self) -> Option<String> {
        if let Some(version) = self.version.get() {
            return Some(version.clone());
        }
        let output = Command::new(&self.binary).arg("--version").output().await.ok()?;
        let version = parse_version(&output)?;
        Some(self.version.get_or_init(|| version).clone())
    }
}

#[async_trait]
impl OcrEngineFactory for TesseractFactory {
    async fn create(&self, language: &str) -> AppResult<Box<dyn OcrEngine>> {
        let version = self.version().await.ok_or_else(|| AppError::OcrError {
            message: format!("Tesseract OCR not available ({})", self.binary),
        })?;

        let scratch = TempDir::with_prefix("tesseract-").map_err(|e| AppError::OcrError {
            message: format!("Failed to create OCR scratch directory: {}", e),
        })?;

        info!(version = %version, language, "Tesseract engine started");

        Ok(Box::new(TesseractEngine {
            binary: self.binary.clone(),
            tessdata_prefix: self.tessdata_prefix.clone(),
            language: language.to_string(),
            scratch,
        }))
    }

    /// Blocks while the binary is probed.
    fn is_available(&self) -> bool {
        if self.version.get().is_some() {
            return true;
        }
        let probed = std::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .ok()
            .and_then(|output| parse_version(&output));
        match probed {
            Some(version) => {
                self.version.get_or_init(|| version);
                true
            }
            None => false,
        }
    }
}

/// Tesseract CLI session. Pages are written into a private scratch
/// directory which disappears on [`OcrEngine::terminate`].
#[derive(Debug)]
pub struct TesseractEngine {
    binary: String,
    tessdata_prefix: Option<PathBuf>,
    language: String,
    scratch: TempDir,
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&mut self, page: &PageImage) -> AppResult<Recognition> {
        let start = Instant::now();
        let input_path = self.scratch.path().join(format!("page-{}.png", page.page));
        let output_base = self.scratch.path().join(format!("page-{}", page.page));

        let image = page.image.clone();
        let save_path = input_path.clone();
        tokio::task::spawn_blocking(move || image.save(&save_path))
            .await?
            .map_err(|e| AppError::OcrError {
                message: format!("Failed to write page image: {}", e),
            })?;

        // One pass produces both the plain text and the word table.
        let mut cmd = Command::new(&self.binary);
        cmd.arg(&input_path)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .arg("txt")
            .arg("tsv");
        if let Some(tessdata) = &self.tessdata_prefix {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }

        let output = cmd.output().await.map_err(|e| AppError::OcrError {
            message: format!("Failed to run tesseract: {}", e),
        })?;
        if !output.status.success() {
            return Err(AppError::OcrError {
                message: format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let text = tokio::fs::read_to_string(output_base.with_extension("txt"))
            .await
            .map_err(|e| AppError::OcrError {
                message: format!("Failed to read tesseract text output: {}", e),
            })?;
        let tsv = tokio::fs::read_to_string(output_base.with_extension("tsv"))
            .await
            .map_err(|e| AppError::OcrError {
                message: format!("Failed to read tesseract tsv output: {}", e),
            })?;

        // Pages are not needed once recognised.
        let _ = tokio::fs::remove_file(&input_path).await;

        let confidence = mean_confidence(&tsv);
        debug!(
            page = page.page,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tesseract pass finished"
        );

        Ok(Recognition {
            text: text.trim().to_string(),
            confidence,
        })
    }

    async fn terminate(self: Box<Self>) -> AppResult<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close().map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to remove OCR scratch directory");
            AppError::OcrError {
                message: format!("Failed to terminate OCR engine: {}", e),
            }
        })?;
        info!("Tesseract engine terminated");
        Ok(())
    }
}

fn parse_version(output: &Output) -> Option<String> {
    if !output.status.success() {
        return None;
    }
    // Older releases print the banner on stderr.
    let banner = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    banner
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// Mean word confidence from tesseract's TSV output, rounded to two decimals.
///
/// Columns: level page_num block_num par_num line_num word_num left top width
/// height conf text. Rows with `conf == -1` are layout rows, not words.
fn mean_confidence(tsv: &str) -> f64 {
    let (sum, count) = tsv
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[11].trim().is_empty() {
                return None;
            }
            cols[10].trim().parse::<f64>().ok().filter(|c| *c >= 0.0)
        })
        .fold((0.0, 0usize), |(sum, count), c| (sum + c, count + 1));

    if count == 0 {
        return 0.0;
    }
    round2((sum / count as f64).clamp(0.0, 100.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_mean_confidence_ignores_layout_rows() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t40\t12\t96.5\tHello\n\
             5\t1\t1\t1\t1\t2\t60\t10\t40\t12\t90.0\tWorld\n"
        );
        assert_eq!(mean_confidence(&tsv), 93.25);
    }

    #[test]
    fn test_mean_confidence_skips_blank_words() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t10\t40\t12\t95\t \n\
             5\t1\t1\t1\t1\t2\t60\t10\t40\t12\t80\tok\n"
        );
        assert_eq!(mean_confidence(&tsv), 80.0);
    }

    #[test]
    fn test_mean_confidence_of_empty_page_is_zero() {
        assert_eq!(mean_confidence(HEADER), 0.0);
        assert_eq!(mean_confidence(""), 0.0);
    }

    #[cfg(unix)]
    fn write_fake_tesseract(path: &std::path::Path) {
        use std::os::unix::fs::PermissionsExt;

        std::fs::write(path, "#!/bin/sh\necho 'tesseract 5.3.4'\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let factory = TesseractFactory::new("/nonexistent/bin/tesseract", None);
        assert!(!factory.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_availability_is_tracked_per_binary() {
        let dir = TempDir::new().unwrap();
        let installed = dir.path().join("tesseract");
        write_fake_tesseract(&installed);

        let present = TesseractFactory::new(installed.to_string_lossy(), None);
        assert!(present.is_available());

        let absent = TesseractFactory::new(dir.path().join("missing").to_string_lossy(), None);
        assert!(!absent.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_installed_after_failed_check_is_picked_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tesseract");
        let factory = TesseractFactory::new(path.to_string_lossy(), None);
        assert!(!factory.is_available());

        write_fake_tesseract(&path);
        assert!(factory.is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_reports_missing_binary_and_starts_installed_one() {
        let dir = TempDir::new().unwrap();
        let missing = TesseractFactory::new(dir.path().join("missing").to_string_lossy(), None);
        let err = match missing.create("eng").await {
            Ok(_) => panic!("engine started without a binary"),
            Err(e) => e,
        };
        assert_eq!(err.error_code(), "OCR_ERROR");
        assert!(err.to_string().contains("not available"));

        let path = dir.path().join("tesseract");
        write_fake_tesseract(&path);
        let factory = TesseractFactory::new(path.to_string_lossy(), None);
        let engine = factory.create("eng").await.unwrap();
        engine.terminate().await.unwrap();
        assert_eq!(factory.version().await.as_deref(), Some("tesseract 5.3.4"));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(88.004), 88.0);
        assert_eq!(round2(95.216), 95.22);
    }
}
