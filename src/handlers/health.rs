use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppResult;
use crate::server::AppState;

/// (rasterizer, ocr engine) availability. Both probes block.
async fn probe_services(state: &AppState) -> AppResult<(bool, bool)> {
    let pipeline = state.pipeline.clone();
    let probes = tokio::task::spawn_blocking(move || {
        (
            pipeline.rasterizer().is_available(),
            pipeline.engines().is_available(),
        )
    })
    .await?;
    Ok(probes)
}

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Health check requested");

    let (rasterizer, ocr_engine) = probe_services(&state).await?;

    let status = if rasterizer && ocr_engine {
        "healthy"
    } else {
        "degraded"
    };

    let response = json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "rasterizer": rasterizer,
            "ocr_engine": ocr_engine
        }
    });

    info!(
        status = status,
        rasterizer_available = rasterizer,
        ocr_available = ocr_engine,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint
pub async fn ready_handler(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    let (rasterizer, ocr_engine) = probe_services(&state)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    if rasterizer && ocr_engine {
        info!("Readiness check passed");
        Ok(StatusCode::OK)
    } else {
        info!(rasterizer, ocr_engine, "Readiness check failed");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
