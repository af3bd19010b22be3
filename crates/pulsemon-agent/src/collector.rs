//! Metric sampling: a runtime poller for process statistics and a system
//! poller for host memory and CPU, both feeding one shared state.

use crate::handoff::Handoff;
use crate::runtime;
use pulsemon_common::model::Metric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use sysinfo::System;
use tokio::time::interval;

const POLL_COUNT: &str = "PollCount";

/// Shared sample state. Gauges and counters sit behind independent
/// read-write locks; the counter map only ever holds `PollCount`.
pub struct Collector {
    gauges: RwLock<HashMap<String, f64>>,
    counters: RwLock<HashMap<String, i64>>,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            gauges: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Zeroes `PollCount`. Called by a sender worker after a successful
    /// delivery, so failed deliveries accumulate into the next report.
    pub fn reset_poll_count(&self) {
        self.counters.write().unwrap().insert(POLL_COUNT.to_string(), 0);
    }

    fn record_runtime_gauges(&self, system: &mut System) {
        let stats = runtime::sample(system);
        let mut gauges = self.gauges.write().unwrap();
        for (name, value) in runtime::gauges(&stats) {
            gauges.insert(name.to_string(), value);
        }
        gauges.insert("RandomValue".to_string(), rand::thread_rng().gen::<f64>());
    }

    fn record_system_gauges(&self, system: &mut System) {
        system.refresh_memory();
        system.refresh_cpu_all();

        let mut gauges = self.gauges.write().unwrap();
        gauges.insert("TotalMemory".to_string(), system.total_memory() as f64);
        gauges.insert("FreeMemory".to_string(), system.free_memory() as f64);
        for (core, cpu) in system.cpus().iter().enumerate() {
            gauges.insert(format!("CPUutilization{core}"), cpu.cpu_usage() as f64);
        }
    }

    fn bump_poll_count(&self) {
        let mut counters = self.counters.write().unwrap();
        *counters.entry(POLL_COUNT.to_string()).or_insert(0) += 1;
    }

    /// Builds a batch from both maps, holding each read lock only while
    /// copying.
    pub fn build_batch(&self) -> Vec<Metric> {
        let mut batch = Vec::new();
        {
            let gauges = self.gauges.read().unwrap();
            batch.reserve(gauges.len());
            for (name, value) in gauges.iter() {
                batch.push(Metric::gauge(name.clone(), *value));
            }
        }
        {
            let counters = self.counters.read().unwrap();
            for (name, delta) in counters.iter() {
                batch.push(Metric::counter(name.clone(), *delta));
            }
        }
        batch
    }

    /// Runtime poller: samples process statistics every `poll_interval`,
    /// bumps `PollCount`, and publishes the combined batch to the handoff.
    pub async fn run_runtime_poller(
        self: Arc<Self>,
        poll_interval: Duration,
        handoff: Arc<Handoff>,
    ) {
        let mut system = System::new();
        let mut tick = interval(poll_interval);
        tick.tick().await;
        loop {
            tick.tick().await;
            self.record_runtime_gauges(&mut system);
            self.bump_poll_count();
            handoff.publish(self.build_batch());
        }
    }

    /// System poller: samples host memory and per-core CPU on the same
    /// period. Does not publish; the runtime poller's batches carry these
    /// gauges along.
    pub async fn run_system_poller(self: Arc<Self>, poll_interval: Duration) {
        let mut system = System::new();
        let mut tick = interval(poll_interval);
        tick.tick().await;
        loop {
            tick.tick().await;
            self.record_system_gauges(&mut system);
        }
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsemon_common::model::MetricKind;

    fn poll_once(collector: &Collector) {
        let mut system = System::new();
        collector.record_runtime_gauges(&mut system);
        collector.bump_poll_count();
    }

    #[test]
    fn batch_contains_runtime_gauges_and_poll_count() {
        let collector = Collector::new();
        poll_once(&collector);

        let batch = collector.build_batch();
        let ids: Vec<&str> = batch.iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&"Alloc"));
        assert!(ids.contains(&"RandomValue"));
        assert!(ids.contains(&POLL_COUNT));

        let poll_count = batch.iter().find(|m| m.id == POLL_COUNT).unwrap();
        assert_eq!(poll_count.kind, MetricKind::Counter);
        assert_eq!(poll_count.delta, Some(1));
    }

    #[test]
    fn poll_count_accumulates_until_reset() {
        let collector = Collector::new();
        poll_once(&collector);
        poll_once(&collector);
        poll_once(&collector);

        let batch = collector.build_batch();
        let poll_count = batch.iter().find(|m| m.id == POLL_COUNT).unwrap();
        assert_eq!(poll_count.delta, Some(3));

        collector.reset_poll_count();
        let batch = collector.build_batch();
        let poll_count = batch.iter().find(|m| m.id == POLL_COUNT).unwrap();
        assert_eq!(poll_count.delta, Some(0));
    }

    #[test]
    fn system_gauges_cover_memory_and_cores() {
        let collector = Collector::new();
        let mut system = System::new();
        collector.record_system_gauges(&mut system);

        let batch = collector.build_batch();
        let ids: Vec<&str> = batch.iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&"TotalMemory"));
        assert!(ids.contains(&"FreeMemory"));
        assert!(ids.iter().any(|id| id.starts_with("CPUutilization")));
    }

    #[test]
    fn random_value_changes_between_polls() {
        let collector = Collector::new();
        poll_once(&collector);
        let first = collector.gauges.read().unwrap()["RandomValue"];
        poll_once(&collector);
        let second = collector.gauges.read().unwrap()["RandomValue"];
        assert_ne!(first, second);
    }
}
