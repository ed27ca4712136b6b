use crate::models::{EventType, MailLogEntry, PersistedEvent, StoredEvent};
use crate::storage::{RefererCount, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

/// Upper bound on interned user agents kept in memory
const USER_AGENT_CACHE_ENTRIES: u64 = 10_000;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
    /// User agent string -> `user_agents.id`
    user_agents: Cache<String, i64>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
            user_agents: Cache::builder()
                .max_capacity(USER_AGENT_CACHE_ENTRIES)
                .build(),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_agents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_agent TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                occurred_at INTEGER NOT NULL,
                host TEXT NOT NULL,
                page TEXT NOT NULL,
                referer TEXT NOT NULL,
                user_agent_id INTEGER REFERENCES user_agents(id),
                ip TEXT NOT NULL,
                raw_event TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_event_logs_host_time ON event_logs(host, occurred_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mail_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                occurred_at INTEGER NOT NULL,
                host TEXT NOT NULL,
                name TEXT NOT NULL,
                org TEXT NOT NULL,
                details TEXT NOT NULL,
                msg TEXT NOT NULL,
                ip TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn append_event(&self, event: &PersistedEvent) -> StorageResult<()> {
        // A missing user agent id is not worth losing the event over
        let user_agent_id = match self.user_agent_id(&event.user_agent).await {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(error = %err, "could not resolve user agent id");
                None
            }
        };

        sqlx::query(
            r#"
            INSERT INTO event_logs (occurred_at, host, page, referer, user_agent_id, ip, raw_event)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.timestamp)
        .bind(&event.host)
        .bind(&event.page)
        .bind(&event.referer)
        .bind(user_agent_id)
        .bind(&event.ip)
        .bind(&event.raw_event)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn append_mail(&self, entry: &MailLogEntry) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mail_logs (occurred_at, host, name, org, details, msg, ip)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.timestamp)
        .bind(&entry.host)
        .bind(&entry.name)
        .bind(&entry.org)
        .bind(&entry.details)
        .bind(&entry.msg)
        .bind(&entry.ip)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn user_agent_id(&self, user_agent: &str) -> StorageResult<i64> {
        let pool = Arc::clone(&self.pool);
        let key = user_agent.to_string();

        // Concurrent misses for the same key share one insert; the unique
        // index covers racing processes.
        self.user_agents
            .try_get_with(key.clone(), async move {
                sqlx::query(
                    "INSERT INTO user_agents (user_agent) VALUES (?) ON CONFLICT(user_agent) DO NOTHING",
                )
                .bind(&key)
                .execute(pool.as_ref())
                .await?;

                sqlx::query_scalar::<_, i64>("SELECT id FROM user_agents WHERE user_agent = ?")
                    .bind(&key)
                    .fetch_one(pool.as_ref())
                    .await
            })
            .await
            .map_err(StorageError::UserAgent)
    }

    async fn count_events(&self, host: &str, event: EventType, since: i64) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM event_logs
            WHERE host = ?
              AND json_extract(raw_event, '$.Event') = ?
              AND occurred_at > ?
            "#,
        )
        .bind(host)
        .bind(event.as_str())
        .bind(since)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn top_referers(
        &self,
        host: &str,
        since: i64,
        limit: i64,
    ) -> StorageResult<Vec<RefererCount>> {
        let referers = sqlx::query_as::<_, RefererCount>(
            r#"
            SELECT referer, COUNT(*) AS count
            FROM event_logs
            WHERE host = ?
              AND json_extract(raw_event, '$.Event') = ?
              AND occurred_at > ?
              AND referer != ''
            GROUP BY referer
            ORDER BY count DESC, referer ASC
            LIMIT ?
            "#,
        )
        .bind(host)
        .bind(EventType::Pageview.as_str())
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(referers)
    }

    async fn recent_events(&self, host: &str, limit: i64) -> StorageResult<Vec<StoredEvent>> {
        let events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT e.id, e.occurred_at, e.host, e.page, e.referer, u.user_agent, e.ip, e.raw_event
            FROM event_logs e
            LEFT JOIN user_agents u ON e.user_agent_id = u.id
            WHERE e.host = ?
            ORDER BY e.id DESC
            LIMIT ?
            "#,
        )
        .bind(host)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }

    async fn recent_mail(&self, host: &str, limit: i64) -> StorageResult<Vec<MailLogEntry>> {
        let entries = sqlx::query_as::<_, MailLogEntry>(
            r#"
            SELECT occurred_at AS timestamp, host, name, org, details, msg, ip
            FROM mail_logs
            WHERE host = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(host)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(entries)
    }
}
