// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overflow handling for the log pipeline.
//!
//! When the shared queue is full the producer routes the chunk through one
//! of four strategies. Nothing is lost silently: compress and spill persist
//! the bytes, sample drops with a counted policy, alert escalates and then
//! compresses (or spills).

use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Strategy applied when the shared chunk queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowStrategy {
    /// Per-job in-memory gzip buffer (best speed)
    Compress,
    /// Per-job temp file in the spill directory
    Spill,
    /// Keep every tenth chunk, drop the rest with a counter
    Sample,
    /// Operator-visible error, double the soft memory limit, then compress
    Alert,
}

impl OverflowStrategy {
    /// Parse a configuration value. Unknown names are a validation error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "compress" => Some(OverflowStrategy::Compress),
            "spill" => Some(OverflowStrategy::Spill),
            "sample" => Some(OverflowStrategy::Sample),
            "alert" => Some(OverflowStrategy::Alert),
            _ => None,
        }
    }
}

jl_core::simple_display! {
    OverflowStrategy {
        Compress => "compress",
        Spill => "spill",
        Sample => "sample",
        Alert => "alert",
    }
}

/// Shared overflow counters. All monotonic.
#[derive(Debug, Default)]
pub(crate) struct OverflowCounters {
    pub dropped_chunks: AtomicU64,
    pub spill_files_created: AtomicU64,
    pub compressed_input_bytes: AtomicU64,
    pub compressed_output_bytes: AtomicU64,
}

struct GzBuffer {
    encoder: GzEncoder<Vec<u8>>,
    /// True sum of uncompressed chunk lengths fed to this encoder.
    input_bytes: u64,
}

struct SpillFile {
    file: File,
    path: PathBuf,
}

/// Per-job overflow stores for one pipeline.
pub(crate) struct OverflowState {
    spill_dir: PathBuf,
    compressors: Mutex<HashMap<String, GzBuffer>>,
    spills: Mutex<HashMap<String, SpillFile>>,
    pub(crate) counters: OverflowCounters,
    /// Soft memory limit; `alert` doubles it on each engagement.
    pub(crate) memory_limit: AtomicU64,
}

impl OverflowState {
    pub(crate) fn new(spill_dir: PathBuf, memory_limit: u64) -> Self {
        Self {
            spill_dir,
            compressors: Mutex::new(HashMap::new()),
            spills: Mutex::new(HashMap::new()),
            counters: OverflowCounters::default(),
            memory_limit: AtomicU64::new(memory_limit),
        }
    }

    /// Append to the job's gzip buffer; a compressor failure routes the
    /// same chunk to spill without counting a drop.
    pub(crate) fn compress(&self, job_uuid: &str, bytes: &[u8]) {
        let failed = {
            let mut compressors = self.compressors.lock();
            let buffer = compressors.entry(job_uuid.to_string()).or_insert_with(|| GzBuffer {
                encoder: GzEncoder::new(Vec::new(), Compression::fast()),
                input_bytes: 0,
            });
            match buffer.encoder.write_all(bytes) {
                Ok(()) => {
                    buffer.input_bytes += bytes.len() as u64;
                    self.counters.compressed_input_bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                    false
                }
                Err(e) => {
                    tracing::warn!(job_uuid, error = %e, "overflow compressor failed");
                    true
                }
            }
        };
        if failed {
            self.spill(job_uuid, bytes);
        }
    }

    /// Append to the job's spill file, creating it on first use.
    pub(crate) fn spill(&self, job_uuid: &str, bytes: &[u8]) {
        let mut spills = self.spills.lock();
        let entry = match spills.get_mut(job_uuid) {
            Some(entry) => entry,
            None => {
                let unix_seconds = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                let path = self.spill_dir.join(format!("spill_{job_uuid}_{unix_seconds}.log"));
                let file = match open_append(&path) {
                    Ok(file) => file,
                    Err(e) => {
                        tracing::error!(job_uuid, error = %e, "spill file create failed; chunk dropped");
                        self.counters.dropped_chunks.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                };
                self.counters.spill_files_created.fetch_add(1, Ordering::Relaxed);
                spills.entry(job_uuid.to_string()).or_insert(SpillFile { file, path })
            }
        };
        if let Err(e) = entry.file.write_all(bytes).and_then(|()| entry.file.sync_all()) {
            tracing::error!(job_uuid, path = %entry.path.display(), error = %e, "spill write failed");
            self.counters.dropped_chunks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a deliberately sampled-out chunk.
    pub(crate) fn count_drop(&self) {
        self.counters.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Alert path: escalate, double the soft limit, then compress.
    pub(crate) fn alert(&self, job_uuid: &str, bytes: &[u8], queue_len: usize) {
        let old = self.memory_limit.load(Ordering::Relaxed);
        let doubled = old.saturating_mul(2);
        self.memory_limit.store(doubled, Ordering::Relaxed);
        tracing::error!(
            job_uuid,
            queue_len,
            memory_limit = doubled,
            "log pipeline queue full; raising soft memory limit"
        );
        self.compress(job_uuid, bytes);
    }

    /// Finish every gzip buffer, writing `compress_<uuid>.log.gz` beside
    /// the spill files, and fsync outstanding spills. Called at shutdown.
    pub(crate) fn finalize(&self) {
        let compressors = std::mem::take(&mut *self.compressors.lock());
        for (job_uuid, buffer) in compressors {
            match buffer.encoder.finish() {
                Ok(compressed) => {
                    self.counters
                        .compressed_output_bytes
                        .fetch_add(compressed.len() as u64, Ordering::Relaxed);
                    let path = self.spill_dir.join(format!("compress_{job_uuid}.log.gz"));
                    if let Err(e) = std::fs::write(&path, &compressed) {
                        tracing::error!(
                            job_uuid = %job_uuid,
                            path = %path.display(),
                            error = %e,
                            "failed to persist compressed overflow"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(job_uuid = %job_uuid, error = %e, "gzip finish failed");
                }
            }
        }

        let mut spills = self.spills.lock();
        for (job_uuid, spill) in spills.iter_mut() {
            if let Err(e) = spill.file.sync_all() {
                tracing::warn!(job_uuid = %job_uuid, error = %e, "spill fsync failed");
            }
        }
        spills.clear();
    }

    /// Drop overflow stores for one job, deleting its spill and compressed
    /// files on disk.
    pub(crate) fn delete_job(&self, job_uuid: &str) {
        self.compressors.lock().remove(job_uuid);
        if let Some(spill) = self.spills.lock().remove(job_uuid) {
            if let Err(e) = std::fs::remove_file(&spill.path) {
                tracing::warn!(job_uuid, error = %e, "spill file removal failed");
            }
        }
        let gz_path = self.spill_dir.join(format!("compress_{job_uuid}.log.gz"));
        if gz_path.exists() {
            if let Err(e) = std::fs::remove_file(&gz_path) {
                tracing::warn!(job_uuid, error = %e, "compressed overflow removal failed");
            }
        }
    }

    /// Compressed-to-uncompressed size ratio using the true input total.
    pub(crate) fn compression_ratio(&self) -> f64 {
        let input = self.counters.compressed_input_bytes.load(Ordering::Relaxed);
        if input == 0 {
            return 0.0;
        }
        // Current output length includes only finished bytes; pending
        // encoder state counts toward the final ratio at finalize().
        let output = self.counters.compressed_output_bytes.load(Ordering::Relaxed);
        output as f64 / input as f64
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
#[path = "overflow_tests.rs"]
mod tests;
