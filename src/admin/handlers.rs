use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::dashboard::{site_report, summarize};
use crate::state::AppContext;

/// Prometheus scrape endpoint
pub async fn scrape_metrics(State(state): State<Arc<AppContext>>) -> Response {
    match state.exporter.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.exporter.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Live counters for all configured sites
pub async fn dashboard_index(State(state): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(summarize(&state.sites, &state.aggregator))
}

/// Live counters and stored history for one site
pub async fn dashboard_site(
    State(state): State<Arc<AppContext>>,
    Path(host): Path<String>,
) -> Response {
    let Some(site) = state.sites.site(&host) else {
        return (StatusCode::NOT_FOUND, "unknown site").into_response();
    };

    let now = chrono::Utc::now().timestamp();
    Json(site_report(site, &state.aggregator, state.storage.as_ref(), now).await).into_response()
}
