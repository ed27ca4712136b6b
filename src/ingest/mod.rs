//! Public listener: beacon ingestion, contact form and client scripts

pub mod classifier;
pub mod handlers;
pub mod normalizer;
pub mod rejection;
pub mod routes;
pub mod static_files;

pub use classifier::{classify, Classified, CorsHeaders};
pub use normalizer::{decode_event, normalize, NormalizedEvent};
pub use rejection::IngestRejection;
pub use routes::create_ingest_router;
