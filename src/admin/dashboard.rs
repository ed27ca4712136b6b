//! Per-site reports for the admin dashboard
//!
//! Live counters come from the in-process aggregator; windowed history is
//! read back from the durable log. A failing query never fails the report:
//! the affected field carries an `unavailable: <reason>` string instead.

use serde::Serialize;
use std::fmt::Display;

use crate::analytics::{CounterSnapshot, LiveAggregator};
use crate::config::{MonitoredSite, SiteRegistry};
use crate::models::EventType;
use crate::storage::{RefererCount, Storage, StorageResult};

/// History windows shown per site, in days
pub const DAY_WINDOWS: [i64; 4] = [1, 7, 30, 365];

/// Referers listed per window
pub const TOP_REFERERS: i64 = 10;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// A value read from storage, or the reason it could not be read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reported<T> {
    Value(T),
    Unavailable(String),
}

impl<T> Reported<T> {
    fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Reported::Value(value),
            Err(err) => Reported::Unavailable(format!("unavailable: {err}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub host: String,
    pub allowed_origins: Vec<String>,
    pub live: CounterSnapshot,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteHistory {
    pub days: i64,
    pub pageviews: Reported<i64>,
    /// Activity beacons fire roughly once a minute while a reader is active
    pub readtime: Reported<String>,
    pub referers: Reported<Vec<RefererCount>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub host: String,
    pub live: CounterSnapshot,
    pub history: Vec<SiteHistory>,
}

/// Live counters for every configured site, in configuration order
pub fn summarize(registry: &SiteRegistry, aggregator: &LiveAggregator) -> Vec<SiteSummary> {
    registry
        .sites()
        .iter()
        .map(|site| {
            let live = aggregator.site_snapshot(&site.host);
            SiteSummary {
                host: site.host.clone(),
                allowed_origins: site.allowed_origins.clone(),
                total: live.total(),
                live,
            }
        })
        .collect()
}

pub async fn site_report(
    site: &MonitoredSite,
    aggregator: &LiveAggregator,
    storage: &dyn Storage,
    now: i64,
) -> SiteReport {
    let mut history = Vec::with_capacity(DAY_WINDOWS.len());
    for days in DAY_WINDOWS {
        history.push(site_history(&site.host, storage, days, now).await);
    }

    SiteReport {
        host: site.host.clone(),
        live: aggregator.site_snapshot(&site.host),
        history,
    }
}

async fn site_history(host: &str, storage: &dyn Storage, days: i64, now: i64) -> SiteHistory {
    let since = now - days * SECONDS_PER_DAY;

    let pageviews = storage
        .count_events(host, EventType::Pageview, since)
        .await;
    let readtime: StorageResult<String> = storage
        .count_events(host, EventType::Activity, since)
        .await
        .map(|minutes| format!("{minutes} minutes"));
    let referers = storage.top_referers(host, since, TOP_REFERERS).await;

    SiteHistory {
        days,
        pageviews: Reported::from_result(pageviews),
        readtime: Reported::from_result(readtime),
        referers: Reported::from_result(referers),
    }
}
