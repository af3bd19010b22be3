//! Single-slot handoff between the collector and the sender.
//!
//! The poller publishes without ever waiting: a new batch displaces any
//! stale one still sitting in the slot. The consumer therefore always
//! receives the freshest batch, never a backlog.

use pulsemon_common::model::Metric;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

pub struct Handoff {
    slot: Mutex<Option<Vec<Metric>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Handoff {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Places a batch in the slot, replacing whatever is there. Never blocks
    /// the publishing thread.
    pub fn publish(&self, batch: Vec<Metric>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let stale = self.slot.lock().unwrap().replace(batch);
        if stale.is_some() {
            tracing::debug!("replaced a stale batch in the handoff slot");
        }
        self.notify.notify_one();
    }

    /// Waits for a batch. Returns `None` once the handoff is closed and the
    /// slot is drained.
    pub async fn recv(&self) -> Option<Vec<Metric>> {
        loop {
            // Register interest before checking the slot so a publish that
            // lands between the check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(batch) = self.slot.lock().unwrap().take() {
                return Some(batch);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}
