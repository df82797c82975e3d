//! Store - append-only SQLite persistence for usage records
//!
//! Uses sqlx for async SQLite access (embedded, no server required).
//! Records are written exactly once, after the outcome is known; there is
//! no update or delete path. Aggregation queries only consider records
//! with `status = 'success'`.

use crate::error::{Error, Result};
use crate::record::{RequestStatus, UsageRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Aggregation dimension for per-user breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Group by `application_id`
    Application,
    /// Group by `model`
    Model,
}

impl Dimension {
    fn column(self) -> &'static str {
        match self {
            Self::Application => "application_id",
            Self::Model => "model",
        }
    }
}

/// Success-only totals for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserSummary {
    /// Number of successful requests
    pub total_requests: i64,
    /// Sum of total token counts
    pub total_tokens: i64,
    /// Sum of prompt token counts
    pub total_prompt_tokens: i64,
    /// Sum of completion token counts
    pub total_completion_tokens: i64,
    /// Sum of request costs in USD
    pub total_cost_usd: f64,
    /// Mean response time in seconds
    pub avg_response_time: f64,
    /// Distinct applications used
    pub apps_used: i64,
    /// Distinct models used
    pub models_used: i64,
}

/// One group row of a per-user breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct GroupUsage {
    /// Group key (an application id or a model id)
    pub key: String,
    /// Successful requests in the group
    pub request_count: i64,
    /// Total tokens in the group
    pub tokens: i64,
    /// Total cost of the group in USD
    pub cost: f64,
}

/// Success-only totals across all users
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalStats {
    /// Number of successful requests
    pub total_requests: i64,
    /// Distinct users seen
    pub unique_users: i64,
    /// Distinct applications seen
    pub unique_apps: i64,
    /// Sum of total token counts
    pub total_tokens: i64,
    /// Sum of request costs in USD
    pub total_cost_usd: f64,
}

/// Usage store backed by a SQLite connection pool
#[derive(Clone)]
pub struct UsageStore {
    pool: SqlitePool,
}

impl UsageStore {
    /// Create a store over an existing connection pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a store at the given database path and
    /// run migrations.
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Database(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("SQLite usage store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        debug!("In-memory SQLite usage store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                id TEXT PRIMARY KEY,
                application_id TEXT,
                user_id TEXT,
                model TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT,
                response_time REAL,
                prompt_tokens INTEGER,
                completion_tokens INTEGER,
                total_tokens INTEGER,
                cost_usd REAL,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_requests_user_id
            ON requests(user_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_requests_application_id
            ON requests(application_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_requests_timestamp
            ON requests(timestamp)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, releasing all connections deterministically
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Persist a finalized record
    #[instrument(skip(self, record), fields(record_id = %record.id, status = record.status.as_str()))]
    pub async fn append(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO requests (
                id, application_id, user_id, model, query, response,
                response_time, prompt_tokens, completion_tokens, total_tokens,
                cost_usd, timestamp, status, error_message
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.application_id)
        .bind(&record.user_id)
        .bind(&record.model)
        .bind(&record.query)
        .bind(&record.response)
        .bind(record.response_time)
        .bind(record.prompt_tokens)
        .bind(record.completion_tokens)
        .bind(record.total_tokens)
        .bind(record.cost_usd)
        .bind(record.timestamp.to_rfc3339())
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Appended usage record {}", record.id);
        Ok(())
    }

    /// All records for a user, newest timestamp first
    #[instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, application_id, user_id, model, query, response,
                   response_time, prompt_tokens, completion_tokens, total_tokens,
                   cost_usd, timestamp, status, error_message
            FROM requests
            WHERE user_id = ?1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Success-only totals for one user; zeroes when the user has none
    #[instrument(skip(self))]
    pub async fn aggregate_by_user(&self, user_id: &str) -> Result<UserSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_requests,
                COALESCE(SUM(total_tokens), 0) AS total_tokens,
                COALESCE(SUM(prompt_tokens), 0) AS total_prompt_tokens,
                COALESCE(SUM(completion_tokens), 0) AS total_completion_tokens,
                COALESCE(SUM(cost_usd), 0.0) AS total_cost_usd,
                COALESCE(AVG(response_time), 0.0) AS avg_response_time,
                COUNT(DISTINCT application_id) AS apps_used,
                COUNT(DISTINCT model) AS models_used
            FROM requests
            WHERE user_id = ?1 AND status = 'success'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(UserSummary {
            total_requests: row
                .try_get("total_requests")
                .map_err(|e| Error::Database(e.to_string()))?,
            total_tokens: row
                .try_get("total_tokens")
                .map_err(|e| Error::Database(e.to_string()))?,
            total_prompt_tokens: row
                .try_get("total_prompt_tokens")
                .map_err(|e| Error::Database(e.to_string()))?,
            total_completion_tokens: row
                .try_get("total_completion_tokens")
                .map_err(|e| Error::Database(e.to_string()))?,
            total_cost_usd: row
                .try_get("total_cost_usd")
                .map_err(|e| Error::Database(e.to_string()))?,
            avg_response_time: row
                .try_get("avg_response_time")
                .map_err(|e| Error::Database(e.to_string()))?,
            apps_used: row
                .try_get("apps_used")
                .map_err(|e| Error::Database(e.to_string()))?,
            models_used: row
                .try_get("models_used")
                .map_err(|e| Error::Database(e.to_string()))?,
        })
    }

    /// Success-only per-user breakdown grouped by the given dimension
    #[instrument(skip(self))]
    pub async fn aggregate_by_user_grouped_by(
        &self,
        user_id: &str,
        dimension: Dimension,
    ) -> Result<Vec<GroupUsage>> {
        // Column names come from the Dimension enum, never from input.
        let sql = format!(
            r#"
            SELECT
                {column} AS group_key,
                COUNT(*) AS request_count,
                COALESCE(SUM(total_tokens), 0) AS tokens,
                COALESCE(SUM(cost_usd), 0.0) AS cost
            FROM requests
            WHERE user_id = ?1 AND status = 'success'
            GROUP BY {column}
            "#,
            column = dimension.column()
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(GroupUsage {
                    key: row
                        .try_get::<Option<String>, _>("group_key")
                        .map_err(|e| Error::Database(e.to_string()))?
                        .unwrap_or_default(),
                    request_count: row
                        .try_get("request_count")
                        .map_err(|e| Error::Database(e.to_string()))?,
                    tokens: row
                        .try_get("tokens")
                        .map_err(|e| Error::Database(e.to_string()))?,
                    cost: row
                        .try_get("cost")
                        .map_err(|e| Error::Database(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Success-only totals across all users; zeroes on an empty store
    #[instrument(skip(self))]
    pub async fn aggregate_global(&self) -> Result<GlobalStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_requests,
                COUNT(DISTINCT user_id) AS unique_users,
                COUNT(DISTINCT application_id) AS unique_apps,
                COALESCE(SUM(total_tokens), 0) AS total_tokens,
                COALESCE(SUM(cost_usd), 0.0) AS total_cost_usd
            FROM requests
            WHERE status = 'success'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(GlobalStats {
            total_requests: row
                .try_get("total_requests")
                .map_err(|e| Error::Database(e.to_string()))?,
            unique_users: row
                .try_get("unique_users")
                .map_err(|e| Error::Database(e.to_string()))?,
            unique_apps: row
                .try_get("unique_apps")
                .map_err(|e| Error::Database(e.to_string()))?,
            total_tokens: row
                .try_get("total_tokens")
                .map_err(|e| Error::Database(e.to_string()))?,
            total_cost_usd: row
                .try_get("total_cost_usd")
                .map_err(|e| Error::Database(e.to_string()))?,
        })
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<UsageRecord> {
    let id: String = row.try_get("id").map_err(|e| Error::Database(e.to_string()))?;
    let id = Uuid::parse_str(&id).map_err(|e| Error::Database(format!("bad record id: {e}")))?;

    let timestamp: String = row
        .try_get("timestamp")
        .map_err(|e| Error::Database(e.to_string()))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| Error::Database(format!("bad timestamp: {e}")))?
        .with_timezone(&Utc);

    let status: String = row
        .try_get("status")
        .map_err(|e| Error::Database(e.to_string()))?;
    let status = RequestStatus::parse(&status)
        .ok_or_else(|| Error::Database(format!("bad status: {status}")))?;

    Ok(UsageRecord {
        id,
        application_id: row
            .try_get::<Option<String>, _>("application_id")
            .map_err(|e| Error::Database(e.to_string()))?
            .unwrap_or_default(),
        user_id: row
            .try_get::<Option<String>, _>("user_id")
            .map_err(|e| Error::Database(e.to_string()))?
            .unwrap_or_default(),
        model: row
            .try_get("model")
            .map_err(|e| Error::Database(e.to_string()))?,
        query: row
            .try_get("query")
            .map_err(|e| Error::Database(e.to_string()))?,
        response: row
            .try_get("response")
            .map_err(|e| Error::Database(e.to_string()))?,
        response_time: row
            .try_get("response_time")
            .map_err(|e| Error::Database(e.to_string()))?,
        prompt_tokens: row
            .try_get("prompt_tokens")
            .map_err(|e| Error::Database(e.to_string()))?,
        completion_tokens: row
            .try_get("completion_tokens")
            .map_err(|e| Error::Database(e.to_string()))?,
        total_tokens: row
            .try_get("total_tokens")
            .map_err(|e| Error::Database(e.to_string()))?,
        cost_usd: row
            .try_get("cost_usd")
            .map_err(|e| Error::Database(e.to_string()))?,
        timestamp,
        status,
        error_message: row
            .try_get("error_message")
            .map_err(|e| Error::Database(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn success_record(
        user_id: &str,
        application_id: &str,
        model: &str,
        tokens: (u32, u32),
        cost: f64,
    ) -> UsageRecord {
        UsageRecord::pending(
            Some(application_id.to_string()),
            Some(user_id.to_string()),
            model,
            "hello",
        )
        .into_success("hi", 0.5, tokens.0, tokens.1, tokens.0 + tokens.1, cost)
    }

    #[tokio::test]
    async fn test_append_and_list_by_user() {
        let store = UsageStore::in_memory().await.unwrap();

        let mut old = success_record("alice", "web-ui", "gpt-4o", (10, 5), 0.0001);
        old.timestamp = Utc::now() - Duration::seconds(60);
        let recent = success_record("alice", "web-ui", "gpt-4o", (20, 10), 0.0002);

        store.append(&old).await.unwrap();
        store.append(&recent).await.unwrap();

        let records = store.list_by_user("alice").await.unwrap();
        assert_eq!(records.len(), 2);
        // Newest first
        assert_eq!(records[0].id, recent.id);
        assert_eq!(records[1].id, old.id);

        assert!(store.list_by_user("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let store = UsageStore::in_memory().await.unwrap();

        let record = success_record("alice", "web-ui", "gpt-4o-mini", (10, 5), 0.000004);
        store.append(&record).await.unwrap();

        let records = store.list_by_user("alice").await.unwrap();
        let loaded = &records[0];
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.model, "gpt-4o-mini");
        assert_eq!(loaded.query, "hello");
        assert_eq!(loaded.response.as_deref(), Some("hi"));
        assert_eq!(loaded.prompt_tokens, Some(10));
        assert_eq!(loaded.completion_tokens, Some(5));
        assert_eq!(loaded.total_tokens, Some(15));
        assert_eq!(loaded.cost_usd, Some(0.000004));
        assert_eq!(loaded.status, RequestStatus::Success);
        assert_eq!(loaded.timestamp, record.timestamp);
    }

    #[tokio::test]
    async fn test_error_records_round_trip_and_list() {
        let store = UsageStore::in_memory().await.unwrap();

        let record = UsageRecord::pending(None, Some("alice".to_string()), "gpt-4o", "hello")
            .into_error("rate limit exceeded");
        store.append(&record).await.unwrap();

        let records = store.list_by_user("alice").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RequestStatus::Error);
        assert_eq!(
            records[0].error_message.as_deref(),
            Some("rate limit exceeded")
        );
        assert!(records[0].response.is_none());
        assert!(records[0].cost_usd.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_by_user_counts_only_successes() {
        let store = UsageStore::in_memory().await.unwrap();

        store
            .append(&success_record("alice", "web-ui", "gpt-4o", (100, 50), 0.5))
            .await
            .unwrap();
        store
            .append(&success_record("alice", "cli", "gpt-4", (200, 100), 1.5))
            .await
            .unwrap();
        store
            .append(
                &UsageRecord::pending(None, Some("alice".to_string()), "gpt-4o", "boom")
                    .into_error("provider down"),
            )
            .await
            .unwrap();
        // Another user's traffic must not leak in
        store
            .append(&success_record("bob", "web-ui", "gpt-4o", (10, 10), 0.1))
            .await
            .unwrap();

        let summary = store.aggregate_by_user("alice").await.unwrap();
        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.total_tokens, 450);
        assert_eq!(summary.total_prompt_tokens, 300);
        assert_eq!(summary.total_completion_tokens, 150);
        assert!((summary.total_cost_usd - 2.0).abs() < 1e-9);
        assert!((summary.avg_response_time - 0.5).abs() < 1e-9);
        assert_eq!(summary.apps_used, 2);
        assert_eq!(summary.models_used, 2);
    }

    #[tokio::test]
    async fn test_aggregate_by_user_empty_is_zeroed() {
        let store = UsageStore::in_memory().await.unwrap();
        let summary = store.aggregate_by_user("nobody").await.unwrap();
        assert_eq!(summary, UserSummary::default());
    }

    #[tokio::test]
    async fn test_grouped_sums_match_ungrouped_total() {
        let store = UsageStore::in_memory().await.unwrap();

        store
            .append(&success_record("alice", "web-ui", "gpt-4o", (100, 50), 0.5))
            .await
            .unwrap();
        store
            .append(&success_record("alice", "web-ui", "gpt-4", (50, 25), 2.0))
            .await
            .unwrap();
        store
            .append(&success_record("alice", "cli", "gpt-4o", (10, 5), 0.05))
            .await
            .unwrap();

        let summary = store.aggregate_by_user("alice").await.unwrap();

        for dimension in [Dimension::Application, Dimension::Model] {
            let groups = store
                .aggregate_by_user_grouped_by("alice", dimension)
                .await
                .unwrap();
            let count: i64 = groups.iter().map(|g| g.request_count).sum();
            let tokens: i64 = groups.iter().map(|g| g.tokens).sum();
            let cost: f64 = groups.iter().map(|g| g.cost).sum();
            assert_eq!(count, summary.total_requests);
            assert_eq!(tokens, summary.total_tokens);
            assert!((cost - summary.total_cost_usd).abs() < 1e-9);
        }

        let by_app = store
            .aggregate_by_user_grouped_by("alice", Dimension::Application)
            .await
            .unwrap();
        assert_eq!(by_app.len(), 2);
        let web = by_app.iter().find(|g| g.key == "web-ui").unwrap();
        assert_eq!(web.request_count, 2);
        assert_eq!(web.tokens, 225);
    }

    #[tokio::test]
    async fn test_aggregate_global() {
        let store = UsageStore::in_memory().await.unwrap();

        store
            .append(&success_record("alice", "web-ui", "gpt-4o", (100, 50), 0.5))
            .await
            .unwrap();
        store
            .append(&success_record("bob", "cli", "gpt-4", (200, 100), 1.0))
            .await
            .unwrap();
        store
            .append(
                &UsageRecord::pending(None, None, "gpt-4o", "boom").into_error("provider down"),
            )
            .await
            .unwrap();

        let stats = store.aggregate_global().await.unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.unique_apps, 2);
        assert_eq!(stats.total_tokens, 450);
        assert!((stats.total_cost_usd - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_aggregate_global_empty_is_zeroed() {
        let store = UsageStore::in_memory().await.unwrap();
        let stats = store.aggregate_global().await.unwrap();
        assert_eq!(stats, GlobalStats::default());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = UsageStore::in_memory().await.unwrap();

        let record = success_record("alice", "web-ui", "gpt-4o", (1, 1), 0.0);
        store.append(&record).await.unwrap();
        assert!(store.append(&record).await.is_err());
    }
}
