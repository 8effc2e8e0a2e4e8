//! Health check and stats endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub archive: &'static str,
    pub media: &'static str,
}

#[derive(Serialize)]
struct NeverRunResponse {
    status: &'static str,
}

/// Process liveness - always returns OK if the server is running
async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness of both remote services; overall status is ok only if both are up
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (archive, media) = tokio::join!(state.archive.ping(), state.media.ping());
    let archive_up = archive.is_ok();
    let media_up = media.is_ok();
    let ok = archive_up && media_up;

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        archive: if archive_up { "up" } else { "down" },
        media: if media_up { "up" } else { "down" },
    };
    let code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

/// Outcome of the most recent completed sync run
async fn stats(State(state): State<AppState>) -> Response {
    match state.sync.last_report() {
        Some(report) => Json(report.as_ref().clone()).into_response(),
        None => Json(NeverRunResponse {
            status: "never run",
        })
        .into_response(),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health))
        .route("/stats", get(stats))
}
