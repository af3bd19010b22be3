//! In-memory backend with optional file persistence.

use crate::error::StorageError;
use crate::file::{self, MetricsWriter};
use crate::Storage;
use async_trait::async_trait;
use pulsemon_common::model::{Metric, MetricKind};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Gauges and counters behind independent read-write locks.
///
/// When synchronous persistence is enabled, the file append happens while
/// the touched map's write lock is still held, so the on-disk order matches
/// the in-memory order.
pub struct MemoryStorage {
    gauges: RwLock<HashMap<String, f64>>,
    counters: RwLock<HashMap<String, i64>>,
    writer: Mutex<Option<MetricsWriter>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            gauges: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            writer: Mutex::new(None),
        }
    }

    /// Wires up file persistence per the configured mode: restore first,
    /// then either synchronous appends (`store_interval == 0`) or a
    /// background snapshot ticker. A no-op without a path.
    pub fn configure_persistence(
        storage: &Arc<MemoryStorage>,
        path: &str,
        restore: bool,
        store_interval: u64,
    ) -> Result<(), StorageError> {
        if path.is_empty() {
            return Ok(());
        }

        if restore {
            storage.restore_from_file(path)?;
        }

        if store_interval == 0 {
            storage.enable_sync_persistence(MetricsWriter::create(path)?);
            tracing::info!(path, "synchronous file persistence enabled");
        } else {
            tracing::info!(path, interval_secs = store_interval, "periodic file persistence enabled");
            let storage = storage.clone();
            let path = path.to_string();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_secs(store_interval));
                tick.tick().await;
                loop {
                    tick.tick().await;
                    if let Err(err) = storage.snapshot_to_file(&path) {
                        tracing::error!(error = %err, "failed to persist metrics snapshot");
                    }
                }
            });
        }

        Ok(())
    }

    /// Replays persisted records through the normal update path. Called
    /// before a sync writer is attached so the replay does not echo records
    /// back into the file.
    pub fn restore_from_file(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let mut restored = 0usize;
        for metric in file::read_metrics(path)? {
            match (metric.kind, metric.value, metric.delta) {
                (MetricKind::Gauge, Some(value), _) => {
                    self.apply_gauge(&metric.id, value)?;
                    restored += 1;
                }
                (MetricKind::Counter, _, Some(delta)) => {
                    self.apply_counter(&metric.id, delta)?;
                    restored += 1;
                }
                _ => {
                    tracing::warn!(id = %metric.id, "skipping persisted metric without payload");
                }
            }
        }
        tracing::info!(restored, "metrics restored from file");
        Ok(())
    }

    pub fn enable_sync_persistence(&self, writer: MetricsWriter) {
        *self.writer.lock().unwrap() = Some(writer);
    }

    /// Rewrites the file from the current snapshot; used by the periodic
    /// persistence ticker.
    pub fn snapshot_to_file(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let gauges = self.gauges.read().unwrap().clone();
        let counters = self.counters.read().unwrap().clone();
        file::write_snapshot(path, &gauges, &counters)
    }

    fn append_record(&self, metric: &Metric) -> Result<(), StorageError> {
        if let Some(writer) = self.writer.lock().unwrap().as_mut() {
            writer.append(metric)?;
        }
        Ok(())
    }

    fn apply_gauge(&self, name: &str, value: f64) -> Result<(), StorageError> {
        let mut gauges = self.gauges.write().unwrap();
        gauges.insert(name.to_string(), value);
        self.append_record(&Metric::gauge(name, value))?;
        tracing::debug!(name, value, "updated gauge");
        Ok(())
    }

    fn apply_counter(&self, name: &str, delta: i64) -> Result<i64, StorageError> {
        let mut counters = self.counters.write().unwrap();
        let total = {
            let slot = counters.entry(name.to_string()).or_insert(0);
            *slot += delta;
            *slot
        };
        self.append_record(&Metric::counter(name, delta))?;
        tracing::debug!(name, delta, total, "updated counter");
        Ok(total)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> Result<(), StorageError> {
        self.apply_gauge(name, value)
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<(), StorageError> {
        self.apply_counter(name, delta).map(|_| ())
    }

    async fn update_counter_and_return(
        &self,
        name: &str,
        delta: i64,
    ) -> Result<i64, StorageError> {
        self.apply_counter(name, delta)
    }

    async fn gauge(&self, name: &str) -> Result<f64, StorageError> {
        self.gauges
            .read()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn counter(&self, name: &str) -> Result<i64, StorageError> {
        self.counters
            .read()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn all_gauges(&self) -> Result<HashMap<String, f64>, StorageError> {
        Ok(self.gauges.read().unwrap().clone())
    }

    async fn all_counters(&self) -> Result<HashMap<String, i64>, StorageError> {
        Ok(self.counters.read().unwrap().clone())
    }

    async fn update_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        for metric in metrics {
            match metric.kind {
                MetricKind::Gauge => {
                    let value = metric.value.ok_or_else(|| StorageError::MissingPayload {
                        id: metric.id.clone(),
                        field: "value",
                    })?;
                    self.apply_gauge(&metric.id, value)?;
                }
                MetricKind::Counter => {
                    let delta = metric.delta.ok_or_else(|| StorageError::MissingPayload {
                        id: metric.id.clone(),
                        field: "delta",
                    })?;
                    self.apply_counter(&metric.id, delta)?;
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Err(StorageError::PingUnsupported)
    }
}
