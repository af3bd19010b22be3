//! Storage layer for the metrics server.
//!
//! Two backends share one [`Storage`] trait: [`memory::MemoryStorage`] with
//! optional file persistence (synchronous append or periodic snapshot), and
//! [`database::DatabaseStorage`] backed by Postgres with transactional batch
//! upserts and connection retry.

pub mod database;
pub mod error;
pub mod file;
pub mod memory;

pub use error::StorageError;

use async_trait::async_trait;
use pulsemon_common::model::Metric;
use std::collections::HashMap;

/// Persistence backend for gauges and counters.
///
/// Implementations must be safe to share across request handlers
/// (`Send + Sync`); the server accesses the storage concurrently from the
/// HTTP or gRPC transport.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Overwrites the gauge stored under `name`.
    async fn update_gauge(&self, name: &str, value: f64) -> Result<(), StorageError>;

    /// Adds `delta` to the counter stored under `name`.
    async fn update_counter(&self, name: &str, delta: i64) -> Result<(), StorageError>;

    /// Adds `delta` and returns the post-increment total.
    async fn update_counter_and_return(&self, name: &str, delta: i64)
        -> Result<i64, StorageError>;

    /// Returns the last written gauge value, or [`StorageError::NotFound`].
    async fn gauge(&self, name: &str) -> Result<f64, StorageError>;

    /// Returns the accumulated counter value, or [`StorageError::NotFound`].
    async fn counter(&self, name: &str) -> Result<i64, StorageError>;

    /// Snapshot of every gauge. The returned map is the caller's to mutate.
    async fn all_gauges(&self) -> Result<HashMap<String, f64>, StorageError>;

    /// Snapshot of every counter. The returned map is the caller's to mutate.
    async fn all_counters(&self) -> Result<HashMap<String, i64>, StorageError>;

    /// Applies a batch of updates. Atomic on the database backend, a
    /// per-metric loop on the memory backend.
    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError>;

    /// Verifies the backing database connection is alive. The memory backend
    /// answers [`StorageError::PingUnsupported`].
    async fn ping(&self) -> Result<(), StorageError>;
}
