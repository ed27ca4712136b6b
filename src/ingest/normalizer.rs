//! Beacon payload validation and page attribution

use super::rejection::IngestRejection;
use crate::models::{EventType, InboundEvent, PersistedEvent};

/// A decoded, validated beacon ready for aggregation and storage
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub event_type: EventType,
    pub page: String,
    /// Empty when the client sent none or it equals `page`
    pub referer: String,
    /// Payload with page and referer removed
    pub raw: InboundEvent,
}

/// Decode a request body. Empty and malformed bodies are both undecodable.
pub fn decode_event(body: &[u8]) -> Result<InboundEvent, IngestRejection> {
    serde_json::from_slice(body).map_err(|_| IngestRejection::Undecodable)
}

/// Validate the event type and attribute the event to a page.
///
/// The page is the one the client reported, else the Referer header, else
/// the origin the request was classified under.
pub fn normalize(
    mut event: InboundEvent,
    origin: &str,
    referer_header: Option<&str>,
) -> Result<NormalizedEvent, IngestRejection> {
    let event_type = match event.event.as_deref() {
        None | Some("") => return Err(IngestRejection::NoEventType),
        Some(name) => name
            .parse::<EventType>()
            .map_err(|err| IngestRejection::UnknownEventType(err.0))?,
    };

    let page = event
        .page
        .take()
        .filter(|page| !page.is_empty())
        .or_else(|| {
            referer_header
                .filter(|referer| !referer.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| origin.to_string());

    let referer = event
        .referer
        .take()
        .filter(|referer| *referer != page)
        .unwrap_or_default();

    Ok(NormalizedEvent {
        event_type,
        page,
        referer,
        raw: event,
    })
}

impl NormalizedEvent {
    pub fn to_persisted(
        &self,
        host: &str,
        ip: &str,
        user_agent: &str,
        timestamp: i64,
    ) -> serde_json::Result<PersistedEvent> {
        Ok(PersistedEvent {
            timestamp,
            host: host.to_string(),
            page: self.page.clone(),
            referer: self.referer.clone(),
            user_agent: user_agent.to_string(),
            ip: ip.to_string(),
            raw_event: serde_json::to_string(&self.raw)?,
        })
    }
}
