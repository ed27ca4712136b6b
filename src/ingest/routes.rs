use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{collect_event, health_check, submit_contact};
use super::static_files::serve_script;
use crate::state::AppContext;

/// Router for the public listener
pub fn create_ingest_router(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", any(collect_event))
        .route("/contact", any(submit_contact))
        .route("/healthz", get(health_check))
        .route("/js/{file}", get(serve_script))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
