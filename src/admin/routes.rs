use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{dashboard_index, dashboard_site, scrape_metrics};
use crate::ingest::handlers::health_check;
use crate::state::AppContext;

/// Router for the restricted admin listener
pub fn create_admin_router(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/metrics", get(scrape_metrics))
        .route("/dashboard", get(dashboard_index))
        .route("/dashboard/{site}", get(dashboard_site))
        .route("/healthz", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
