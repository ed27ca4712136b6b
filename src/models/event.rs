use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kinds of beacon events accepted by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Pageview,
    Click,
    Activity,
    Context,
    Vitals,
    Email,
}

impl EventType {
    pub const COUNT: usize = 6;

    pub const ALL: [EventType; Self::COUNT] = [
        EventType::Pageview,
        EventType::Click,
        EventType::Activity,
        EventType::Context,
        EventType::Vitals,
        EventType::Email,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::Pageview => "pageview",
            EventType::Click => "click",
            EventType::Activity => "activity",
            EventType::Context => "context",
            EventType::Vitals => "vitals",
            EventType::Email => "email",
        }
    }

    /// Stable slot of this type in per-site counter arrays
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Beacon payload as sent by the client script.
///
/// Every field is optional on the wire and omitted again when serialized for
/// storage. Stored payloads use the capitalized names (`Event`, `Page`, ...)
/// which the reporting queries extract with `json_extract`; lowercase and
/// camelCase spellings are accepted on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "Event", alias = "event", default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(
        rename = "JSVersion",
        alias = "jsVersion",
        alias = "jsversion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub js_version: Option<String>,

    #[serde(
        rename = "SessionId",
        alias = "sessionId",
        alias = "sessionid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,

    /// Page that triggered the event
    #[serde(rename = "Page", alias = "page", default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    /// Page that sent the visitor to `page`
    #[serde(rename = "Referer", alias = "referer", default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    #[serde(
        rename = "LoadTime",
        alias = "loadTime",
        alias = "loadtime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub load_time: Option<f64>,

    // click events
    #[serde(rename = "Target", alias = "target", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(rename = "Value", alias = "value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    // activity events
    #[serde(
        rename = "ScrollPerc",
        alias = "scrollPerc",
        alias = "scrollperc",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scroll_perc: Option<String>,

    // web vitals
    #[serde(rename = "LCP", alias = "lcp", default, skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,

    #[serde(rename = "FID", alias = "fid", default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<f64>,

    #[serde(rename = "CLS", alias = "cls", default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,

    #[serde(
        rename = "NavigationType",
        alias = "navigationType",
        alias = "navigationtype",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub navigation_type: Option<String>,
}

/// Event row handed to the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEvent {
    /// Unix timestamp (seconds) at which the event was received
    pub timestamp: i64,
    pub host: String,
    pub page: String,
    pub referer: String,
    pub user_agent: String,
    pub ip: String,
    /// JSON form of the [`InboundEvent`] with page and referer removed
    pub raw_event: String,
}

/// Event row read back from the durable log
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredEvent {
    pub id: i64,
    pub occurred_at: i64,
    pub host: String,
    pub page: String,
    pub referer: String,
    pub user_agent: Option<String>,
    pub ip: String,
    pub raw_event: String,
}
