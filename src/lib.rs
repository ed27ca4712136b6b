pub mod admin;
pub mod analytics;
pub mod config;
pub mod ingest;
pub mod mailer;
pub mod models;
pub mod server;
pub mod state;
pub mod storage;
