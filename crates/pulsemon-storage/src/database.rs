//! Postgres backend with transactional batch upserts and connection retry.

use crate::error::StorageError;
use crate::Storage;
use async_trait::async_trait;
use pulsemon_common::model::{Metric, MetricKind};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

const GAUGE_UPSERT: &str = "
    INSERT INTO gauge (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value
";

const COUNTER_UPSERT: &str = "
    INSERT INTO counter (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = counter.value + EXCLUDED.value
";

const COUNTER_UPSERT_RETURNING: &str = "
    INSERT INTO counter (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = counter.value + EXCLUDED.value
    RETURNING value
";

/// Backoff schedule for connection-class failures.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

pub struct DatabaseStorage {
    pool: PgPool,
}

impl DatabaseStorage {
    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().connect(dsn).await?;
        Ok(Self { pool })
    }

    /// Runs the embedded migrations. Any failure here is fatal at startup;
    /// an up-to-date schema is a successful no-op.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Runs `op` up to three times, sleeping 1s/3s/5s between attempts, but
    /// only for connection-class errors. Anything else fails immediately.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_connection_error(&err) => {
                    if attempt == RETRY_DELAYS.len() - 1 {
                        tracing::error!(error = %err, "database still unreachable, giving up");
                        return Err(StorageError::RetriesExhausted(err));
                    }
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %err,
                        "database connection error, retrying"
                    );
                    tokio::time::sleep(RETRY_DELAYS[attempt]).await;
                    attempt += 1;
                }
                Err(err) => return Err(StorageError::Database(err)),
            }
        }
    }
}

/// SQLSTATE class 08 (connection exceptions, including protocol violations)
/// plus pool- and IO-level failures to reach the server at all.
fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| code.starts_with("08")),
        _ => false,
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<(), StorageError> {
        self.with_retry(|| async move {
            sqlx::query(GAUGE_UPSERT)
                .bind(name)
                .bind(value)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<(), StorageError> {
        self.with_retry(|| async move {
            sqlx::query(COUNTER_UPSERT)
                .bind(name)
                .bind(delta)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    async fn update_counter_and_return(
        &self,
        name: &str,
        delta: i64,
    ) -> Result<i64, StorageError> {
        self.with_retry(|| async move {
            sqlx::query_scalar::<_, i64>(COUNTER_UPSERT_RETURNING)
                .bind(name)
                .bind(delta)
                .fetch_one(&self.pool)
                .await
        })
        .await
    }

    async fn gauge(&self, name: &str) -> Result<f64, StorageError> {
        let value = self
            .with_retry(|| async move {
                sqlx::query_scalar::<_, f64>("SELECT value FROM gauge WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
            })
            .await?;
        value.ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn counter(&self, name: &str) -> Result<i64, StorageError> {
        let value = self
            .with_retry(|| async move {
                sqlx::query_scalar::<_, i64>("SELECT value FROM counter WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
            })
            .await?;
        value.ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn all_gauges(&self) -> Result<HashMap<String, f64>, StorageError> {
        let rows = self
            .with_retry(|| async move {
                sqlx::query_as::<_, (String, f64)>("SELECT name, value FROM gauge")
                    .fetch_all(&self.pool)
                    .await
            })
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn all_counters(&self) -> Result<HashMap<String, i64>, StorageError> {
        let rows = self
            .with_retry(|| async move {
                sqlx::query_as::<_, (String, i64)>("SELECT name, value FROM counter")
                    .fetch_all(&self.pool)
                    .await
            })
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for metric in metrics {
            match metric.kind {
                MetricKind::Gauge => {
                    let value = metric.value.ok_or_else(|| StorageError::MissingPayload {
                        id: metric.id.clone(),
                        field: "value",
                    })?;
                    sqlx::query(GAUGE_UPSERT)
                        .bind(&metric.id)
                        .bind(value)
                        .execute(&mut *tx)
                        .await?;
                }
                MetricKind::Counter => {
                    let delta = metric.delta.ok_or_else(|| StorageError::MissingPayload {
                        id: metric.id.clone(),
                        field: "delta",
                    })?;
                    sqlx::query(COUNTER_UPSERT)
                        .bind(&metric.id)
                        .bind(delta)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }
}
