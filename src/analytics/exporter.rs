//! Prometheus exposition of the live counters
//!
//! The collector builds `events_total` fresh on every scrape from a snapshot
//! of the aggregator, stamped with the scrape time. Nothing is cached between
//! scrapes, so values are always the cumulative counts at that instant.

use chrono::Utc;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Counter, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::Arc;

use super::aggregator::LiveAggregator;
use crate::models::EventType;

const EVENTS_TOTAL: &str = "events_total";
const EVENTS_HELP: &str = "Number of events";

/// Custom collector exporting one counter series per (event, site)
pub struct EventsCollector {
    aggregator: Arc<LiveAggregator>,
    desc: Desc,
}

impl EventsCollector {
    pub fn new(aggregator: Arc<LiveAggregator>) -> prometheus::Result<Self> {
        let desc = Desc::new(
            EVENTS_TOTAL.to_string(),
            EVENTS_HELP.to_string(),
            vec!["event".to_string(), "site".to_string()],
            HashMap::new(),
        )?;
        Ok(Self { aggregator, desc })
    }

    fn label_pair(name: &str, value: &str) -> LabelPair {
        let mut pair = LabelPair::default();
        pair.set_name(name.to_string());
        pair.set_value(value.to_string());
        pair
    }

    fn counter_metric(event: EventType, site: &str, value: u64, timestamp_ms: i64) -> Metric {
        let mut metric = Metric::default();
        metric.set_label(
            vec![
                Self::label_pair("event", event.as_str()),
                Self::label_pair("site", site),
            ]
            .into(),
        );
        let mut counter = Counter::default();
        counter.set_value(value as f64);
        metric.set_counter(counter);
        metric.set_timestamp_ms(timestamp_ms);
        metric
    }
}

impl Collector for EventsCollector {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let timestamp_ms = Utc::now().timestamp_millis();

        let mut family = MetricFamily::default();
        family.set_name(EVENTS_TOTAL.to_string());
        family.set_help(EVENTS_HELP.to_string());
        family.set_field_type(MetricType::COUNTER);

        for (site, counters) in self.aggregator.snapshot() {
            for (event, count) in counters.recorded() {
                family
                    .mut_metric()
                    .push(Self::counter_metric(event, &site, count, timestamp_ms));
            }
        }

        // An empty family cannot be encoded
        if family.get_metric().is_empty() {
            return Vec::new();
        }
        vec![family]
    }
}

/// Registry wrapper rendering the text exposition format
pub struct MetricsExporter {
    registry: Registry,
}

impl MetricsExporter {
    pub fn new(aggregator: Arc<LiveAggregator>) -> prometheus::Result<Self> {
        let registry = Registry::new();
        registry.register(Box::new(EventsCollector::new(aggregator)?))?;
        Ok(Self { registry })
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Gather and encode the current counters
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
