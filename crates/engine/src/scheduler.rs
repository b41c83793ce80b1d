// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-ordered queue for deferred jobs.
//!
//! Immediate jobs never touch the scheduler; deferred jobs wait here until
//! due, when their uuid is handed to the dispatch channel. A single worker
//! sleeps to the next deadline and re-arms when an earlier entry arrives.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct SchedulerInner {
    /// `(due_epoch_ms, job_uuid)` — ordered by due time, uuid as tiebreak.
    queue: Mutex<BTreeSet<(u64, String)>>,
    notify: Notify,
    shutdown: CancellationToken,
}

/// Deferred-job queue with a single dispatch worker.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start the worker; due job uuids are sent to `dispatch`.
    pub fn start(dispatch: mpsc::Sender<String>) -> Self {
        let inner = Arc::new(SchedulerInner {
            queue: Mutex::new(BTreeSet::new()),
            notify: Notify::new(),
            shutdown: CancellationToken::new(),
        });
        let worker = tokio::spawn(run(Arc::clone(&inner), dispatch));
        Self { inner, worker: Mutex::new(Some(worker)) }
    }

    /// Queue a job for dispatch at `due_epoch_ms`.
    pub fn schedule(&self, job_uuid: &str, due_epoch_ms: u64) {
        self.inner.queue.lock().insert((due_epoch_ms, job_uuid.to_string()));
        self.inner.notify.notify_one();
    }

    /// Remove a deferred job. Returns false when it was not queued (it may
    /// already have dispatched).
    pub fn cancel(&self, job_uuid: &str) -> bool {
        let mut queue = self.inner.queue.lock();
        let entry = queue.iter().find(|(_, uuid)| uuid == job_uuid).cloned();
        match entry {
            Some(entry) => {
                queue.remove(&entry);
                self.inner.notify.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "scheduler worker panicked");
            }
        }
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

async fn run(inner: Arc<SchedulerInner>, dispatch: mpsc::Sender<String>) {
    loop {
        let next_due = inner.queue.lock().iter().next().cloned();
        match next_due {
            None => {
                tokio::select! {
                    _ = inner.notify.notified() => {}
                    _ = inner.shutdown.cancelled() => return,
                }
            }
            Some((due_ms, uuid)) => {
                let now = epoch_ms();
                if due_ms <= now {
                    inner.queue.lock().remove(&(due_ms, uuid.clone()));
                    if dispatch.send(uuid).await.is_err() {
                        // Dispatch side gone; nothing left to do.
                        return;
                    }
                    continue;
                }
                let wait = Duration::from_millis(due_ms - now);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = inner.notify.notified() => {}
                    _ = inner.shutdown.cancelled() => return,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
