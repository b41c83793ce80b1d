// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn limits_snapshot_from_resource_limits() {
    let limits = ResourceLimits {
        max_cpu_percent: 200,
        max_memory_bytes: 1 << 30,
        max_iobps: 0,
        ..Default::default()
    };
    let snap = LimitsSnapshot::from(&limits);
    assert_eq!(snap.max_cpu_percent, 200);
    assert_eq!(snap.max_memory_bytes, 1 << 30);
    assert_eq!(snap.max_iobps, 0);
}

#[test]
fn sample_serde_round_trip() {
    let sample = MetricsSample {
        job_uuid: "u".into(),
        timestamp_ms: 99,
        cpu: CpuStats { usage_percent: 50.0, user_usec: 10, system_usec: 5, throttle_percent: 0.0 },
        gpu: vec![GpuStats { index: 0, ..Default::default() }],
        ..Default::default()
    };
    let json = serde_json::to_string(&sample).unwrap();
    let parsed: MetricsSample = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, sample);
}

#[test]
fn empty_gpu_list_omitted() {
    let sample = MetricsSample::default();
    let json = serde_json::to_value(&sample).unwrap();
    assert!(json.get("gpu").is_none());
}
