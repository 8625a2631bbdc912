use std::sync::Mutex;

use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::EmailType;

/// "User U received an email of type T at time S". Written once, after the
/// provider accepted the email, and only ever counted afterwards.
#[derive(Debug, Clone)]
pub struct SendRecord {
    pub user_id: Uuid,
    pub email_type: EmailType,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
}

// In-memory counters would work if all incoming requests were being served by
// a single API instance. This is not our case: the API is replicated, so the
// counts have to live out-of-process, and the limiter only ever talks to them
// through this trait.
/// Append-only log of sent emails, queried by windowed count.
#[async_trait::async_trait]
pub trait SendLog: Send + Sync {
    /// Number of records for `(user_id, email_type)` with `sent_at >= since`
    async fn count_since(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        since: DateTime<Utc>,
    ) -> Result<i64, anyhow::Error>;

    async fn insert(
        &self,
        record: &SendRecord,
    ) -> Result<(), anyhow::Error>;
}

/// Backed by the `email_send_log` table (see `migrations`). Cleanup of old
/// rows is left to the database.
pub struct PgSendLog {
    pool: PgPool,
}

impl PgSendLog {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

// `query!` would need a live db (or `.sqlx` metadata) at compile time; the
// unchecked variants are used instead, the queries are trivial anyway
#[async_trait::async_trait]
impl SendLog for PgSendLog {
    #[tracing::instrument(name = "Counting sent emails", skip(self))]
    async fn count_since(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        since: DateTime<Utc>,
    ) -> Result<i64, anyhow::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM email_send_log
            WHERE
                user_id = $1 AND
                email_type = $2 AND
                sent_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(email_type.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count rows in email_send_log")?;
        Ok(count)
    }

    #[tracing::instrument(name = "INSERTing send record into db", skip(self))]
    async fn insert(
        &self,
        record: &SendRecord,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO email_send_log
                (id, user_id, email_type, recipient, sent_at)
            VALUES
                ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.email_type.as_str())
        .bind(&record.recipient)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert into email_send_log")?;
        Ok(())
    }
}

/// Process-local log for local development and tests. Counts are lost on
/// restart and are not shared between replicas.
#[derive(Default)]
pub struct InMemorySendLog {
    records: Mutex<Vec<SendRecord>>,
}

impl InMemorySendLog {
    pub fn new() -> Self { Self::default() }

    pub fn records(&self) -> Result<Vec<SendRecord>, anyhow::Error> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("send log lock poisoned: {e}"))?;
        Ok(records.clone())
    }
}

#[async_trait::async_trait]
impl SendLog for InMemorySendLog {
    async fn count_since(
        &self,
        user_id: Uuid,
        email_type: EmailType,
        since: DateTime<Utc>,
    ) -> Result<i64, anyhow::Error> {
        let count = self
            .records()?
            .iter()
            .filter(|r| r.user_id == user_id && r.email_type == email_type && r.sent_at >= since)
            .count();
        Ok(count as i64)
    }

    async fn insert(
        &self,
        record: &SendRecord,
    ) -> Result<(), anyhow::Error> {
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("send log lock poisoned: {e}"))?
            .push(record.clone());
        Ok(())
    }
}
