use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::USER_AGENT, request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::classifier::{classify, header_str};
use super::normalizer::{decode_event, normalize, NormalizedEvent};
use super::rejection::IngestRejection;
use crate::analytics::extract_client_ip;
use crate::analytics::ip_extractor::socket_addr;
use crate::mailer::OutboundMail;
use crate::models::{ContactMessage, EventType, MailLogEntry};
use crate::state::AppContext;

/// Collect a beacon event
///
/// Accepts any method: `OPTIONS` is answered as a CORS preflight, everything
/// else must carry a JSON event body.
pub async fn collect_event(State(state): State<Arc<AppContext>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let classified = match classify(&state.sites, &parts.method, &parts.headers) {
        Ok(classified) => classified,
        Err(rejection) => return rejection.into_response(),
    };
    let cors = classified.cors.clone();
    if classified.preflight {
        return (cors, StatusCode::OK).into_response();
    }

    let normalized = match read_body(&state, body)
        .await
        .and_then(|bytes| decode_event(&bytes))
        .and_then(|event| {
            normalize(
                event,
                &classified.origin,
                header_str(&parts.headers, "referer"),
            )
        }) {
        Ok(normalized) => normalized,
        Err(rejection) => return (cors, rejection).into_response(),
    };

    let host = classified.site.host.as_str();
    let ip = caller_ip(&state, &parts);

    if state.sites.is_ignored_ip(&ip) {
        info!(
            site = %host,
            event = %normalized.event_type,
            page = %normalized.page,
            ip = %ip,
            "Ignoring event from ignored IP"
        );
        return (cors, StatusCode::OK).into_response();
    }

    record_event(&state, host, &ip, &parts.headers, &normalized).await;
    state.aggregator.increment(host, normalized.event_type);

    (cors, StatusCode::OK).into_response()
}

async fn record_event(
    state: &AppContext,
    host: &str,
    ip: &str,
    headers: &HeaderMap,
    normalized: &NormalizedEvent,
) {
    let user_agent = header_str(headers, USER_AGENT.as_str()).unwrap_or_default();
    let persisted = match normalized.to_persisted(host, ip, user_agent, now()) {
        Ok(persisted) => persisted,
        Err(err) => {
            error!(site = %host, error = %err, "Could not serialize raw event");
            return;
        }
    };

    if let Err(err) = state.storage.append_event(&persisted).await {
        error!(site = %host, error = %err, "Could not log raw event");
    }
}

/// Contact form submission
pub async fn submit_contact(State(state): State<Arc<AppContext>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    if parts.method != Method::POST && parts.method != Method::OPTIONS {
        return IngestRejection::Method.into_response();
    }

    let classified = match classify(&state.sites, &parts.method, &parts.headers) {
        Ok(classified) => classified,
        Err(rejection) => return rejection.into_response(),
    };
    let cors = classified.cors.clone();
    if classified.preflight {
        return (cors, StatusCode::OK).into_response();
    }

    let site = classified.site;
    if site.contacts.is_empty() {
        return (cors, IngestRejection::NoContacts).into_response();
    }

    let message = match read_body(&state, body).await.and_then(|bytes| {
        serde_json::from_slice::<ContactMessage>(&bytes).map_err(|_| IngestRejection::Undecodable)
    }) {
        Ok(message) => message,
        Err(rejection) => return (cors, rejection).into_response(),
    };

    let ip = caller_ip(&state, &parts);
    let entry = MailLogEntry::from_message(message, &site.host, &ip, now());

    if state.sites.is_ignored_ip(&ip) {
        info!(site = %site.host, ip = %ip, "Not logging contact submission from ignored IP");
    } else {
        if let Err(err) = state.storage.append_mail(&entry).await {
            error!(site = %site.host, error = %err, "Could not log contact data");
        }
        state.aggregator.increment(&site.host, EventType::Email);
    }

    let mail = OutboundMail::contact_submission(&state.contact.from_address, &site.contacts, &entry);
    if let Err(err) = state.mailer.send(&mail).await {
        warn!(site = %site.host, to = ?site.contacts, error = %err, "Failed to send contact mail");
    }

    (cors, StatusCode::OK).into_response()
}

/// Health check
pub async fn health_check() -> &'static str {
    "all good"
}

async fn read_body(state: &AppContext, body: Body) -> Result<axum::body::Bytes, IngestRejection> {
    to_bytes(body, state.ingest.max_body_bytes)
        .await
        .map_err(|_| IngestRejection::Undecodable)
}

fn caller_ip(state: &AppContext, parts: &Parts) -> String {
    extract_client_ip(
        &parts.headers,
        socket_addr(&parts.extensions),
        &state.ingest.client_ip_header,
    )
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
