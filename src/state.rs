use std::sync::Arc;

use crate::analytics::{LiveAggregator, MetricsExporter};
use crate::config::{ContactConfig, IngestConfig, SiteRegistry};
use crate::mailer::Mailer;
use crate::storage::Storage;

/// Everything request handlers share, on both listeners
pub struct AppContext {
    pub sites: Arc<SiteRegistry>,
    pub aggregator: Arc<LiveAggregator>,
    pub exporter: MetricsExporter,
    pub storage: Arc<dyn Storage>,
    pub mailer: Arc<dyn Mailer>,
    pub ingest: IngestConfig,
    pub contact: ContactConfig,
}

impl AppContext {
    pub fn new(
        sites: SiteRegistry,
        storage: Arc<dyn Storage>,
        mailer: Arc<dyn Mailer>,
        ingest: IngestConfig,
        contact: ContactConfig,
    ) -> anyhow::Result<Self> {
        let aggregator = Arc::new(LiveAggregator::new());
        let exporter = MetricsExporter::new(Arc::clone(&aggregator))?;

        Ok(Self {
            sites: Arc::new(sites),
            aggregator,
            exporter,
            storage,
            mailer,
            ingest,
            contact,
        })
    }
}
