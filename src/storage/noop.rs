use crate::models::{EventType, MailLogEntry, PersistedEvent, StoredEvent};
use crate::storage::{RefererCount, Storage, StorageError, StorageResult};
use async_trait::async_trait;

/// Sink used when no database is available.
///
/// Writes are accepted and discarded so ingestion and live metrics keep
/// working; reads report [`StorageError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

#[async_trait]
impl Storage for NoopStorage {
    async fn init(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn append_event(&self, _event: &PersistedEvent) -> StorageResult<()> {
        Ok(())
    }

    async fn append_mail(&self, _entry: &MailLogEntry) -> StorageResult<()> {
        Ok(())
    }

    async fn user_agent_id(&self, _user_agent: &str) -> StorageResult<i64> {
        Err(StorageError::Unavailable)
    }

    async fn count_events(
        &self,
        _host: &str,
        _event: EventType,
        _since: i64,
    ) -> StorageResult<i64> {
        Err(StorageError::Unavailable)
    }

    async fn top_referers(
        &self,
        _host: &str,
        _since: i64,
        _limit: i64,
    ) -> StorageResult<Vec<RefererCount>> {
        Err(StorageError::Unavailable)
    }

    async fn recent_events(&self, _host: &str, _limit: i64) -> StorageResult<Vec<StoredEvent>> {
        Err(StorageError::Unavailable)
    }

    async fn recent_mail(&self, _host: &str, _limit: i64) -> StorageResult<Vec<MailLogEntry>> {
        Err(StorageError::Unavailable)
    }
}
