use crate::models::{EventType, MailLogEntry, PersistedEvent, StoredEvent};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no database configured")]
    Unavailable,
    #[error("user agent lookup failed: {0}")]
    UserAgent(Arc<sqlx::Error>),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Referer with the number of pageviews it sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RefererCount {
    pub referer: String,
    pub count: i64,
}

/// Durable event log.
///
/// Write failures are reported to the caller, which logs and drops them; the
/// ingestion path never fails a request because of storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> StorageResult<()>;

    /// Append a validated event to the log
    async fn append_event(&self, event: &PersistedEvent) -> StorageResult<()>;

    /// Append a contact form submission to the mail log
    async fn append_mail(&self, entry: &MailLogEntry) -> StorageResult<()>;

    /// Identifier for a user agent string, creating it on first use
    async fn user_agent_id(&self, user_agent: &str) -> StorageResult<i64>;

    /// Count events of one type for `host` received after `since` (unix seconds)
    async fn count_events(&self, host: &str, event: EventType, since: i64) -> StorageResult<i64>;

    /// Most frequent non-empty pageview referers for `host` since `since`
    async fn top_referers(
        &self,
        host: &str,
        since: i64,
        limit: i64,
    ) -> StorageResult<Vec<RefererCount>>;

    /// Most recent events for `host`, newest first
    async fn recent_events(&self, host: &str, limit: i64) -> StorageResult<Vec<StoredEvent>>;

    /// Most recent contact submissions for `host`, newest first
    async fn recent_mail(&self, host: &str, limit: i64) -> StorageResult<Vec<MailLogEntry>>;
}
