//! Axum router wiring.
//!
//! - `/`             : landing page
//! - `<metrics_path>`: scrape + Prometheus text format
//! - `/healthz`      : liveness

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    let metrics_path = state.metrics_path().to_string();
    Router::new()
        .route("/", get(ops::landing))
        .route("/healthz", get(ops::healthz))
        .route(&metrics_path, get(ops::metrics))
        .with_state(state)
}
