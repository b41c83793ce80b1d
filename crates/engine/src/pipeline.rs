// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asynchronous log pipeline.
//!
//! Producers enqueue copies of log chunks onto a single shared bounded
//! queue and return immediately; a background consumer batches chunks and
//! appends them to per-job files, fsyncing per batch. A full queue engages
//! the configured overflow strategy — the producer never blocks.

use crate::overflow::{OverflowState, OverflowStrategy};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pipeline tuning. Defaults match the shipped configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub log_dir: PathBuf,
    pub spill_dir: PathBuf,
    /// Shared queue capacity
    pub queue_size: usize,
    /// Chunks per flush batch
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub overflow: OverflowStrategy,
    /// Soft memory ceiling the alert strategy doubles
    pub memory_limit: u64,
}

impl PipelineConfig {
    pub fn new(log_dir: impl Into<PathBuf>, spill_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            spill_dir: spill_dir.into(),
            queue_size: 100_000,
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
            overflow: OverflowStrategy::Compress,
            memory_limit: 64 << 20,
        }
    }

    jl_core::setters! {
        set {
            queue_size: usize,
            batch_size: usize,
            flush_interval: Duration,
            overflow: OverflowStrategy,
            memory_limit: u64,
        }
    }
}

/// One in-flight log chunk. Immutable once enqueued.
struct Chunk {
    job_uuid: String,
    bytes: Vec<u8>,
    // Arrival instant; sequence is the tiebreaker, order is positional.
    #[allow(dead_code)]
    arrived_at_ms: u64,
    sequence: u64,
}

struct LogFileEntry {
    /// Dropped (closing the handle) at shutdown; the path stays queryable.
    file: Option<Arc<File>>,
    path: PathBuf,
}

struct Shared {
    queue: Mutex<VecDeque<Chunk>>,
    queue_size: usize,
    batch_size: usize,
    flush_interval: Duration,
    notify: Notify,
    shutdown: CancellationToken,
    closed: AtomicBool,
    sequence: AtomicU64,
    strategy: OverflowStrategy,
    overflow: OverflowState,
    files: Mutex<HashMap<String, LogFileEntry>>,
    log_dir: PathBuf,
    enqueued: AtomicU64,
    flushed_chunks: AtomicU64,
    flushed_bytes: AtomicU64,
}

/// Monotonic pipeline counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub enqueued: u64,
    pub flushed_chunks: u64,
    pub flushed_bytes: u64,
    pub dropped_chunks: u64,
    pub spill_files_created: u64,
    pub compression_ratio: f64,
}

/// Handle to the running pipeline.
pub struct LogPipeline {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LogPipeline {
    /// Create directories and start the consumer task.
    pub fn start(config: PipelineConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.log_dir)?;
        std::fs::create_dir_all(&config.spill_dir)?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(config.queue_size.min(4096))),
            queue_size: config.queue_size.max(1),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval,
            notify: Notify::new(),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            strategy: config.overflow,
            overflow: OverflowState::new(config.spill_dir, config.memory_limit),
            files: Mutex::new(HashMap::new()),
            log_dir: config.log_dir,
            enqueued: AtomicU64::new(0),
            flushed_chunks: AtomicU64::new(0),
            flushed_bytes: AtomicU64::new(0),
        });

        let worker = tokio::spawn(consume(Arc::clone(&shared)));
        Ok(Self { shared, worker: Mutex::new(Some(worker)) })
    }

    /// Accept log bytes for a job. Copies the buffer and returns quickly;
    /// never blocks and has no error return.
    pub fn write(&self, job_uuid: &str, bytes: &[u8]) {
        if self.shared.closed.load(Ordering::Acquire) {
            tracing::warn!(job_uuid, "write after pipeline close discarded");
            return;
        }
        let sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let chunk = Chunk {
            job_uuid: job_uuid.to_string(),
            bytes: bytes.to_vec(),
            arrived_at_ms: epoch_ms(),
            sequence,
        };

        {
            let mut queue = self.shared.queue.lock();
            if queue.len() < self.shared.queue_size {
                queue.push_back(chunk);
                drop(queue);
                self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
                self.shared.notify.notify_one();
                return;
            }
        }
        self.handle_overflow(chunk);
    }

    fn handle_overflow(&self, chunk: Chunk) {
        let shared = &self.shared;
        match shared.strategy {
            OverflowStrategy::Compress => shared.overflow.compress(&chunk.job_uuid, &chunk.bytes),
            OverflowStrategy::Spill => shared.overflow.spill(&chunk.job_uuid, &chunk.bytes),
            OverflowStrategy::Alert => {
                let queue_len = shared.queue.lock().len();
                shared.overflow.alert(&chunk.job_uuid, &chunk.bytes, queue_len);
            }
            OverflowStrategy::Sample => {
                if chunk.sequence % 10 == 0 {
                    let mut queue = shared.queue.lock();
                    if queue.len() >= shared.queue_size && queue.pop_front().is_some() {
                        // The displaced oldest chunk is a counted drop.
                        shared.overflow.count_drop();
                    }
                    queue.push_back(chunk);
                    drop(queue);
                    shared.enqueued.fetch_add(1, Ordering::Relaxed);
                    shared.notify.notify_one();
                } else {
                    shared.overflow.count_drop();
                }
            }
        }
    }

    /// Close the job's log file if open and remove its on-disk log files
    /// (primary, spill, and compressed overflow).
    pub fn delete_job_logs(&self, job_uuid: &str) -> std::io::Result<()> {
        self.shared.files.lock().remove(job_uuid);

        let prefix = format!("{job_uuid}_");
        for entry in std::fs::read_dir(&self.shared.log_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".log") {
                std::fs::remove_file(entry.path())?;
            }
        }
        self.shared.overflow.delete_job(job_uuid);
        Ok(())
    }

    /// Stop accepting chunks, flush outstanding batches, finalize overflow
    /// stores, and close file handles.
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.shutdown.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "log pipeline consumer panicked");
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let shared = &self.shared;
        PipelineStats {
            enqueued: shared.enqueued.load(Ordering::Relaxed),
            flushed_chunks: shared.flushed_chunks.load(Ordering::Relaxed),
            flushed_bytes: shared.flushed_bytes.load(Ordering::Relaxed),
            dropped_chunks: shared.overflow.counters.dropped_chunks.load(Ordering::Relaxed),
            spill_files_created: shared
                .overflow
                .counters
                .spill_files_created
                .load(Ordering::Relaxed),
            compression_ratio: shared.overflow.compression_ratio(),
        }
    }

    /// Path of the job's current primary log file, if one has been created.
    pub fn log_file_path(&self, job_uuid: &str) -> Option<PathBuf> {
        self.shared.files.lock().get(job_uuid).map(|entry| entry.path.clone())
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Single consumer: batch, flush on size or interval, drain on shutdown.
async fn consume(shared: Arc<Shared>) {
    let mut batch: Vec<Chunk> = Vec::with_capacity(shared.batch_size);
    let mut last_flush = Instant::now();

    loop {
        fill_batch(&shared, &mut batch);

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

    // Shutdown: drain whatever is queued, then settle files and overflow.
    loop {
        fill_batch(&shared, &mut batch);
        if batch.is_empty() {
            break;
        }
        flush(&shared, &mut batch);
    }
    shared.overflow.finalize();

    let mut files = shared.files.lock();
    for (job_uuid, entry) in files.iter_mut() {
        if let Some(file) = entry.file.take() {
            if let Err(e) = file.sync_all() {
                tracing::warn!(job_uuid = %job_uuid, error = %e, "final fsync failed");
            }
        }
    }
}

fn fill_batch(shared: &Shared, batch: &mut Vec<Chunk>) {
    let mut queue = shared.queue.lock();
    while batch.len() < shared.batch_size {
        match queue.pop_front() {
            Some(chunk) => batch.push(chunk),
            None => break,
        }
    }
}

/// Group the batch by job and append each group in order, fsyncing per
/// file. The file map lock is never held across a write.
fn flush(shared: &Shared, batch: &mut Vec<Chunk>) {
    let mut groups: indexmap::IndexMap<String, Vec<Chunk>> = indexmap::IndexMap::new();
    for chunk in batch.drain(..) {
        groups.entry(chunk.job_uuid.clone()).or_default().push(chunk);
    }

    for (job_uuid, chunks) in groups {
        let file = match get_or_create_file(shared, &job_uuid) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(job_uuid = %job_uuid, error = %e, "log file open failed; batch lost");
                continue;
            }
        };

        let mut written = 0u64;
        let mut failed = false;
        for chunk in &chunks {
            if let Err(e) = (&*file).write_all(&chunk.bytes) {
                tracing::error!(job_uuid = %job_uuid, error = %e, "log append failed");
                failed = true;
                break;
            }
            written += chunk.bytes.len() as u64;
        }
        if let Err(e) = file.sync_all() {
            tracing::warn!(job_uuid = %job_uuid, error = %e, "log fsync failed");
        }
        if !failed {
            shared.flushed_chunks.fetch_add(chunks.len() as u64, Ordering::Relaxed);
        }
        shared.flushed_bytes.fetch_add(written, Ordering::Relaxed);
    }
}

fn get_or_create_file(shared: &Shared, job_uuid: &str) -> std::io::Result<Arc<File>> {
    let mut files = shared.files.lock();
    if let Some(entry) = files.get(job_uuid) {
        if let Some(file) = &entry.file {
            return Ok(Arc::clone(file));
        }
    }
    // Timestamp fixed at creation; reopening after deletion gets a new one.
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let path = shared.log_dir.join(format!("{job_uuid}_{timestamp}.log"));
    let file = Arc::new(OpenOptions::new().create(true).append(true).open(&path)?);
    files.insert(job_uuid.to_string(), LogFileEntry { file: Some(Arc::clone(&file)), path });
    Ok(file)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
