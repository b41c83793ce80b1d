// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job resource usage samples.

use crate::job::ResourceLimits;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Percent of one core over the last tick
    pub usage_percent: f64,
    pub user_usec: u64,
    pub system_usec: u64,
    /// Fraction of periods throttled over the last tick, in percent
    pub throttle_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub current_bytes: u64,
    pub peak_bytes: u64,
    pub anon_bytes: u64,
    pub file_bytes: u64,
    pub major_faults: u64,
    pub oom_events: u64,
    /// Current over the configured limit, in percent; 0 when unlimited
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoStats {
    pub read_bps: u64,
    pub write_bps: u64,
    pub read_iops: u64,
    pub write_iops: u64,
    pub total_read_bytes: u64,
    pub total_write_bytes: u64,
    pub total_read_ops: u64,
    pub total_write_ops: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bps: u64,
    pub tx_bps: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub process_count: u64,
    pub thread_count: u64,
    pub open_fds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuStats {
    pub index: u32,
    pub utilization_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub temperature_celsius: u32,
    pub power_watts: f64,
}

/// Snapshot of the limits a sample was collected under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsSnapshot {
    pub max_cpu_percent: u32,
    pub max_memory_bytes: u64,
    pub max_iobps: u64,
}

impl From<&ResourceLimits> for LimitsSnapshot {
    fn from(limits: &ResourceLimits) -> Self {
        Self {
            max_cpu_percent: limits.max_cpu_percent,
            max_memory_bytes: limits.max_memory_bytes,
            max_iobps: limits.max_iobps,
        }
    }
}

/// One collection tick's worth of counters for a job.
///
/// Immutable once built; published exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub job_uuid: String,
    pub timestamp_ms: u64,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub io: IoStats,
    pub network: NetworkStats,
    pub process: ProcessStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu: Vec<GpuStats>,
    pub limits: LimitsSnapshot,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
