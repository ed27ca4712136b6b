//! Live event analytics
//!
//! In-process counters per site and event type, their Prometheus
//! exposition, and caller IP resolution used for suppression.

pub mod aggregator;
pub mod exporter;
pub mod ip_extractor;

pub use aggregator::{CounterSnapshot, LiveAggregator, SiteCounters};
pub use exporter::{EventsCollector, MetricsExporter};
pub use ip_extractor::extract_client_ip;
