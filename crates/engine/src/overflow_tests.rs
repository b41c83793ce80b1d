// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::atomic::Ordering;
use yare::parameterized;

#[parameterized(
    compress = { "compress", Some(OverflowStrategy::Compress) },
    spill = { "spill", Some(OverflowStrategy::Spill) },
    sample = { "sample", Some(OverflowStrategy::Sample) },
    alert = { "alert", Some(OverflowStrategy::Alert) },
    unknown = { "zstd", None },
    empty = { "", None },
)]
fn strategy_parse(input: &str, expected: Option<OverflowStrategy>) {
    assert_eq!(OverflowStrategy::parse(input), expected);
}

#[test]
fn compress_then_finalize_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let state = OverflowState::new(dir.path().to_path_buf(), 1 << 20);

    state.compress("job-1", b"hello ");
    state.compress("job-1", b"world");
    state.finalize();

    let gz_path = dir.path().join("compress_job-1.log.gz");
    let mut decoder = GzDecoder::new(std::fs::File::open(&gz_path).unwrap());
    let mut decoded = String::new();
    decoder.read_to_string(&mut decoded).unwrap();
    assert_eq!(decoded, "hello world");

    assert_eq!(state.counters.compressed_input_bytes.load(Ordering::Relaxed), 11);
    assert_eq!(state.counters.dropped_chunks.load(Ordering::Relaxed), 0);
}

#[test]
fn spill_creates_one_file_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let state = OverflowState::new(dir.path().to_path_buf(), 1 << 20);

    state.spill("job-1", b"aa");
    state.spill("job-1", b"bb");
    state.spill("job-2", b"cc");

    assert_eq!(state.counters.spill_files_created.load(Ordering::Relaxed), 2);
    let spill_1: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("spill_job-1_"))
        .collect();
    assert_eq!(spill_1.len(), 1);
    assert_eq!(std::fs::read(spill_1[0].path()).unwrap(), b"aabb");
}

#[test]
fn alert_doubles_soft_limit_and_compresses() {
    let dir = tempfile::tempdir().unwrap();
    let state = OverflowState::new(dir.path().to_path_buf(), 4096);

    state.alert("job-1", b"data", 100);
    assert_eq!(state.memory_limit.load(Ordering::Relaxed), 8192);
    state.alert("job-1", b"data", 100);
    assert_eq!(state.memory_limit.load(Ordering::Relaxed), 16384);
    assert_eq!(state.counters.compressed_input_bytes.load(Ordering::Relaxed), 8);
}

#[test]
fn delete_job_removes_overflow_files() {
    let dir = tempfile::tempdir().unwrap();
    let state = OverflowState::new(dir.path().to_path_buf(), 1 << 20);

    state.spill("job-1", b"spilled");
    state.compress("job-1", b"compressed");
    state.delete_job("job-1");

    let remaining: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(remaining.is_empty());
}

#[test]
fn compression_ratio_uses_true_input_total() {
    let dir = tempfile::tempdir().unwrap();
    let state = OverflowState::new(dir.path().to_path_buf(), 1 << 20);
    assert_eq!(state.compression_ratio(), 0.0);

    // Variable-sized chunks; the denominator must be their true sum.
    state.compress("job-1", &[b'a'; 100]);
    state.compress("job-1", &[b'a'; 1000]);
    state.finalize();

    let ratio = state.compression_ratio();
    assert!(ratio > 0.0);
    // 1100 bytes of a single repeated byte compress far below 1:1.
    assert!(ratio < 0.5, "ratio was {ratio}");
}
