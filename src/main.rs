use pdf_ocr::{AppState, Config, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing; LOG_FORMAT=json switches to structured output.
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_ocr=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_target(false)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_target(false)))
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting PDF OCR service");
    tracing::info!("Max file size: {}MB", config.max_file_size_mb);
    tracing::info!("Render scale: {}x, OCR language: {}", config.render_scale, config.ocr_language);

    let server = Server::start(AppState::from_config(config)).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await
}
