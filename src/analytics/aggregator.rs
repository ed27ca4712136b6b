//! Live in-memory event counters
//!
//! Counters are cumulative since process start and are never drained: the
//! durable log holds history, these only feed the scrape endpoint and the
//! dashboard's live view.
//!
//! Concurrency model:
//! - Per-site counter sets live in a `DashMap`, so site creation is an atomic
//!   check-and-insert on a single shard.
//! - Each counter is an `AtomicU64`; increments never take a map write lock
//!   once the site exists, and readers only hold a shard read lock while
//!   cloning the `Arc`.

use dashmap::DashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::EventType;

/// Counters for one site, one slot per [`EventType`]
#[derive(Debug)]
pub struct SiteCounters {
    counts: [AtomicU64; EventType::COUNT],
}

impl SiteCounters {
    fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn increment(&self, event: EventType) {
        self.counts[event.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, event: EventType) -> u64 {
        self.counts[event.index()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            counts: std::array::from_fn(|i| self.counts[i].load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of a site's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    counts: [u64; EventType::COUNT],
}

impl CounterSnapshot {
    pub fn get(&self, event: EventType) -> u64 {
        self.counts[event.index()]
    }

    /// Counters that have been incremented at least once
    pub fn recorded(&self) -> impl Iterator<Item = (EventType, u64)> + '_ {
        EventType::ALL
            .into_iter()
            .map(|event| (event, self.get(event)))
            .filter(|(_, count)| *count > 0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl Serialize for CounterSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(EventType::COUNT))?;
        for event in EventType::ALL {
            map.serialize_entry(event.as_str(), &self.get(event))?;
        }
        map.end()
    }
}

/// Concurrent site -> counters store, owned by the application context
#[derive(Debug, Default)]
pub struct LiveAggregator {
    sites: DashMap<String, Arc<SiteCounters>>,
}

impl LiveAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the counters for `site`, creating an all-zero set on first use.
    pub fn get_or_create(&self, site: &str) -> Arc<SiteCounters> {
        if let Some(existing) = self.sites.get(site) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .sites
            .entry(site.to_string())
            .or_insert_with(|| Arc::new(SiteCounters::new()));
        Arc::clone(entry.value())
    }

    /// Add one to the `event` counter of `site`
    pub fn increment(&self, site: &str, event: EventType) {
        self.get_or_create(site).increment(event);
    }

    /// Snapshot of one site without creating it.
    pub fn site_snapshot(&self, site: &str) -> CounterSnapshot {
        self.sites
            .get(site)
            .map(|entry| entry.value().snapshot())
            .unwrap_or_default()
    }

    /// Snapshot of every known site, sorted by site
    pub fn snapshot(&self) -> Vec<(String, CounterSnapshot)> {
        let mut sites: Vec<(String, CounterSnapshot)> = self
            .sites
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        sites.sort_by(|a, b| a.0.cmp(&b.0));
        sites
    }

    /// Number of sites seen since start
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
