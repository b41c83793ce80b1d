// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched JSONL writer for metrics samples.
//!
//! Same producer/consumer shape as the log pipeline, minus overflow
//! strategies: a full queue drops the sample with a counter. Each job's
//! samples land in `<dir>/<uuid>.jsonl`, replayed as history before live
//! streaming.

use crate::bus::{EventBus, TOPIC_JOBS};
use jl_core::{Event, MetricsSample};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MetricsSinkConfig {
    pub directory: PathBuf,
    pub queue_size: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl MetricsSinkConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            queue_size: 10_000,
            batch_size: 50,
            flush_interval: Duration::from_millis(500),
        }
    }

    jl_core::setters! {
        set {
            queue_size: usize,
            batch_size: usize,
            flush_interval: Duration,
        }
    }
}

struct SinkShared {
    queue: Mutex<VecDeque<MetricsSample>>,
    queue_size: usize,
    batch_size: usize,
    flush_interval: Duration,
    notify: Notify,
    shutdown: CancellationToken,
    closed: AtomicBool,
    directory: PathBuf,
    dropped: AtomicU64,
    written: AtomicU64,
}

/// Sample sink: persists to JSONL and publishes live events.
pub struct MetricsSink {
    shared: Arc<SinkShared>,
    bus: EventBus,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsSink {
    pub fn start(config: MetricsSinkConfig, bus: EventBus) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.directory)?;
        let shared = Arc::new(SinkShared {
            queue: Mutex::new(VecDeque::new()),
            queue_size: config.queue_size.max(1),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval,
            notify: Notify::new(),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            directory: config.directory,
            dropped: AtomicU64::new(0),
            written: AtomicU64::new(0),
        });
        let worker = tokio::spawn(consume(Arc::clone(&shared)));
        Ok(Self { shared, bus, worker: Mutex::new(Some(worker)) })
    }

    /// Accept a sample: enqueue for persistence and publish for live
    /// subscribers. Non-blocking.
    pub fn record(&self, sample: MetricsSample) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        let event = Event::MetricsSample {
            uuid: sample.job_uuid.clone(),
            sample: Box::new(sample.clone()),
        };
        if let Err(e) = self.bus.publish(TOPIC_JOBS, event) {
            tracing::debug!(error = %e, "metrics publish skipped");
        }

        let mut queue = self.shared.queue.lock();
        if queue.len() < self.shared.queue_size {
            queue.push_back(sample);
            drop(queue);
            self.shared.notify.notify_one();
        } else {
            drop(queue);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Persisted samples for a job, oldest first.
    pub fn history(&self, job_uuid: &str, limit: usize) -> Vec<MetricsSample> {
        let path = self.shared.directory.join(format!("{job_uuid}.jsonl"));
        let Ok(file) = std::fs::File::open(&path) else {
            return Vec::new();
        };
        let mut samples: Vec<MetricsSample> = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();
        if limit > 0 && samples.len() > limit {
            samples.drain(..samples.len() - limit);
        }
        samples
    }

    pub fn dropped_samples(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn written_samples(&self) -> u64 {
        self.shared.written.load(Ordering::Relaxed)
    }

    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.shutdown.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "metrics sink consumer panicked");
            }
        }
    }
}

async fn consume(shared: Arc<SinkShared>) {
    let mut batch: Vec<MetricsSample> = Vec::with_capacity(shared.batch_size);
    let mut last_flush = Instant::now();

    loop {
        {
            let mut queue = shared.queue.lock();
            while batch.len() < shared.batch_size {
                match queue.pop_front() {
                    Some(sample) => batch.push(sample),
                    None => break,
                }
            }
        }

        if batch.len() >= shared.batch_size {
            flush(&shared, &mut batch);
            last_flush = Instant::now();
            continue;
        }
        let elapsed = last_flush.elapsed();
        if elapsed >= shared.flush_interval {
            if !batch.is_empty() {
                flush(&shared, &mut batch);
            }
            last_flush = Instant::now();
            continue;
        }

        tokio::select! {
            _ = shared.notify.notified() => {}
            _ = tokio::time::sleep(shared.flush_interval - elapsed) => {}
            _ = shared.shutdown.cancelled() => break,
        }
    }

    loop {
        {
            let mut queue = shared.queue.lock();
            while batch.len() < shared.batch_size {
                match queue.pop_front() {
                    Some(sample) => batch.push(sample),
                    None => break,
                }
            }
        }
        if batch.is_empty() {
            break;
        }
        flush(&shared, &mut batch);
    }
}

fn flush(shared: &SinkShared, batch: &mut Vec<MetricsSample>) {
    let mut groups: indexmap::IndexMap<String, Vec<MetricsSample>> = indexmap::IndexMap::new();
    for sample in batch.drain(..) {
        groups.entry(sample.job_uuid.clone()).or_default().push(sample);
    }

    for (job_uuid, samples) in groups {
        let path = shared.directory.join(format!("{job_uuid}.jsonl"));
        let file = OpenOptions::new().create(true).append(true).open(&path);
        let mut file = match file {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(job_uuid = %job_uuid, error = %e, "metrics file open failed");
                continue;
            }
        };
        let mut count = 0u64;
        for sample in &samples {
            match serde_json::to_string(sample) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{line}") {
                        tracing::error!(job_uuid = %job_uuid, error = %e, "metrics append failed");
                        break;
                    }
                    count += 1;
                }
                Err(e) => tracing::error!(job_uuid = %job_uuid, error = %e, "sample encode failed"),
            }
        }
        if let Err(e) = file.sync_all() {
            tracing::warn!(job_uuid = %job_uuid, error = %e, "metrics fsync failed");
        }
        shared.written.fetch_add(count, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "metrics_sink_tests.rs"]
mod tests;
