//! Rate-limited delivery: a report ticker feeding a pool of sender workers.

use crate::client::MetricClient;
use crate::collector::Collector;
use crate::handoff::Handoff;
use pulsemon_common::model::Metric;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;

pub struct Sender {
    client: Arc<dyn MetricClient>,
    collector: Arc<Collector>,
    rate_limit: usize,
    report_interval: Duration,
}

impl Sender {
    pub fn new(
        client: Arc<dyn MetricClient>,
        collector: Arc<Collector>,
        rate_limit: usize,
        report_interval: Duration,
    ) -> Self {
        Self {
            client,
            collector,
            rate_limit,
            report_interval,
        }
    }

    /// Runs until the handoff closes: each report tick takes one batch from
    /// the handoff and queues it for a worker. On exit the jobs channel is
    /// dropped so workers drain what is left and return.
    pub async fn run(&self, handoff: Arc<Handoff>) {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Vec<Metric>>(self.rate_limit);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let mut workers = Vec::with_capacity(self.rate_limit);
        for id in 1..=self.rate_limit {
            workers.push(tokio::spawn(worker(
                id,
                self.client.clone(),
                self.collector.clone(),
                jobs_rx.clone(),
            )));
        }

        let mut tick = interval(self.report_interval);
        tick.tick().await;
        loop {
            tick.tick().await;
            tracing::info!("sending metrics");
            match handoff.recv().await {
                Some(batch) => {
                    if jobs_tx.send(batch).await.is_err() {
                        break;
                    }
                }
                None => break,
            }
        }

        drop(jobs_tx);
        for handle in workers {
            let _ = handle.await;
        }
    }
}

async fn worker(
    id: usize,
    client: Arc<dyn MetricClient>,
    collector: Arc<Collector>,
    jobs: Arc<Mutex<mpsc::Receiver<Vec<Metric>>>>,
) {
    tracing::info!(worker = id, "starting sender worker");
    loop {
        // The lock is held only while waiting for a job; it is released
        // before the send so other workers can pull the next batch.
        let batch = { jobs.lock().await.recv().await };
        let Some(batch) = batch else { break };

        match client.send_metrics(&batch).await {
            Ok(()) => collector.reset_poll_count(),
            Err(err) => {
                tracing::error!(worker = id, error = %err, "failed to send metrics");
            }
        }
    }
    tracing::debug!(worker = id, "sender worker stopped");
}
