use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

use crate::config::Config;
use crate::handlers::{health_handler, index_handler, ocr_handler, ready_handler};
use crate::middleware::logging_middleware;
use crate::services::{
    OcrEngineFactory, OcrPipeline, PdfiumRasterizer, Rasterizer, TesseractFactory, UploadStore,
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Everything a request needs. Immutable and cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: UploadStore,
    pub pipeline: OcrPipeline,
}

impl AppState {
    pub fn new(
        config: Config,
        rasterizer: Arc<dyn Rasterizer>,
        engines: Arc<dyn OcrEngineFactory>,
    ) -> Self {
        let pipeline = OcrPipeline::from_config(&config, rasterizer, engines);
        Self {
            store: UploadStore::new(config.upload_dir.clone()),
            config: Arc::new(config),
            pipeline,
        }
    }

    /// State wired to pdfium and the tesseract binary.
    pub fn from_config(config: Config) -> Self {
        let rasterizer = Arc::new(PdfiumRasterizer::new(config.pdfium_library_path.clone()));
        let engines = Arc::new(TesseractFactory::from_config(&config));
        Self::new(config, rasterizer, engines)
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(index_handler))
        .route("/ocr", post(ocr_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(logging_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::disable()),
        )
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// A bound, running HTTP server.
pub struct Server {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl Server {
    /// Bind to the configured address and start serving in the background.
    pub async fn start(state: AppState) -> Result<Self> {
        let addr = state.config.bind_address();
        state
            .store
            .ensure_dir()
            .context("Failed to prepare upload directory")?;

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;

        let app = build_router(state);
        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        info!("PDF OCR server running on http://{}", local_addr);
        info!("POST /ocr -> extract text from PDF");

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown),
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.local_addr, path)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle
            .await
            .context("Server task panicked")?
            .context("Server error")?;
        info!("Server stopped");
        Ok(())
    }

    /// Serve until `signal` resolves, then stop.
    pub async fn run_until<F>(mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            _ = signal => None,
            res = &mut self.handle => Some(res),
        };

        match finished {
            None => self.stop().await,
            Some(res) => {
                res.context("Server task panicked")?.context("Server error")?;
                Ok(())
            }
        }
    }
}
