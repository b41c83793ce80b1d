// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Back-pressure behavior of the log pipeline under the compress strategy.

use flate2::read::GzDecoder;
use jl_engine::{LogPipeline, OverflowStrategy, PipelineConfig};
use std::io::Read;
use std::time::{Duration, Instant};

/// Tiny queue, fast producer: every byte must survive across the primary
/// file and the gzip overflow, with no drops and no producer stalls.
#[tokio::test(flavor = "current_thread")]
async fn compress_backpressure_preserves_all_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = LogPipeline::start(
        PipelineConfig::new(dir.path().join("logs"), dir.path().join("spill"))
            .queue_size(8)
            .batch_size(4)
            .flush_interval(Duration::from_secs(1))
            .overflow(OverflowStrategy::Compress),
    )
    .unwrap();

    let payload = [b'x'; 16];
    let start = Instant::now();
    for _ in 0..100 {
        pipeline.write("job-1", &payload);
    }
    let elapsed = start.elapsed();
    assert!(elapsed < Duration::from_millis(100), "producer stalled for {elapsed:?}");

    pipeline.close().await;

    let stats = pipeline.stats();
    assert_eq!(stats.dropped_chunks, 0);

    let file_bytes = std::fs::read(pipeline.log_file_path("job-1").unwrap()).unwrap();
    let gz_path = dir.path().join("spill").join("compress_job-1.log.gz");
    let gz_bytes = if gz_path.exists() {
        let mut decoder = GzDecoder::new(std::fs::File::open(&gz_path).unwrap());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    } else {
        Vec::new()
    };

    assert_eq!(file_bytes.len() + gz_bytes.len(), 1600);
    assert!(file_bytes.iter().chain(gz_bytes.iter()).all(|b| *b == b'x'));
}

/// Byte accounting holds for the sample strategy too: drops are counted,
/// everything else is committed.
#[tokio::test(flavor = "current_thread")]
async fn sample_accounting_matches_drop_counter() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = LogPipeline::start(
        PipelineConfig::new(dir.path().join("logs"), dir.path().join("spill"))
            .queue_size(4)
            .batch_size(4)
            .flush_interval(Duration::from_secs(1))
            .overflow(OverflowStrategy::Sample),
    )
    .unwrap();

    let payload = [b'y'; 16];
    for _ in 0..50 {
        pipeline.write("job-1", &payload);
    }
    pipeline.close().await;

    let stats = pipeline.stats();
    let file_bytes = std::fs::read(pipeline.log_file_path("job-1").unwrap()).unwrap();
    assert_eq!(file_bytes.len() as u64, 50 * 16 - stats.dropped_chunks * 16);
}
