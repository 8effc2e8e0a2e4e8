//! API route definitions
//!
//! One inbound webhook endpoint plus the read-only health/stats surface.
//! Anything else answers 404.

pub mod health;
pub mod notify;

use axum::Router;

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notify::router())
        .with_state(state)
}
