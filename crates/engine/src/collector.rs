// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job periodic metrics sampler.
//!
//! One background tick task per job reads raw counters from the sandbox's
//! resource handle, derives rates from deltas since the previous tick, and
//! hands the sample to the sink. At most one collector per job.

use crate::error::EngineError;
use crate::metrics_sink::MetricsSink;
use jl_core::{
    Clock, CpuStats, GpuStats, IoStats, LimitsSnapshot, MemoryStats, MetricsSample, NetworkStats,
    ProcessStats, ResourceLimits, SystemClock,
};
use jl_sandbox::{RawCounters, ResourceReader};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Ticks faster than this are clamped.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default collection interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

struct CollectorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Registry of active per-job samplers.
pub struct MetricsCollector {
    active: Mutex<HashMap<String, CollectorHandle>>,
    sink: Arc<MetricsSink>,
}

impl MetricsCollector {
    pub fn new(sink: Arc<MetricsSink>) -> Self {
        Self { active: Mutex::new(HashMap::new()), sink }
    }

    /// Begin sampling a job. Rejects a second collector for the same job.
    pub fn start(
        &self,
        job_uuid: &str,
        reader: Arc<dyn ResourceReader>,
        interval: Duration,
        limits: &ResourceLimits,
        gpu_indices: Option<Vec<u32>>,
    ) -> Result<(), EngineError> {
        let mut active = self.active.lock();
        if active.contains_key(job_uuid) {
            return Err(EngineError::Conflict(format!(
                "metrics collector already running for job {job_uuid}"
            )));
        }

        let interval = interval.max(MIN_INTERVAL);
        let token = CancellationToken::new();
        let task = tokio::spawn(tick_loop(
            job_uuid.to_string(),
            reader,
            interval,
            LimitsSnapshot::from(limits),
            gpu_indices,
            Arc::clone(&self.sink),
            token.clone(),
        ));
        active.insert(job_uuid.to_string(), CollectorHandle { token, task });
        tracing::debug!(job_uuid, interval_secs = interval.as_secs(), "metrics collector started");
        Ok(())
    }

    /// Cancel a job's sampler and release its resource handle.
    pub fn stop(&self, job_uuid: &str) -> Result<(), EngineError> {
        let handle = self
            .active
            .lock()
            .remove(job_uuid)
            .ok_or_else(|| EngineError::not_found("metrics collector", job_uuid))?;
        handle.token.cancel();
        handle.task.abort();
        Ok(())
    }

    pub fn is_active(&self, job_uuid: &str) -> bool {
        self.active.lock().contains_key(job_uuid)
    }

    /// Stop every collector.
    pub fn close(&self) {
        let mut active = self.active.lock();
        for (job_uuid, handle) in active.drain() {
            tracing::debug!(job_uuid = %job_uuid, "stopping metrics collector");
            handle.token.cancel();
            handle.task.abort();
        }
    }
}

async fn tick_loop(
    job_uuid: String,
    reader: Arc<dyn ResourceReader>,
    interval: Duration,
    limits: LimitsSnapshot,
    gpu_indices: Option<Vec<u32>>,
    sink: Arc<MetricsSink>,
    token: CancellationToken,
) {
    let clock = SystemClock;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; it seeds the delta baseline.
    let mut previous: Option<(RawCounters, std::time::Instant)> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = token.cancelled() => return,
        }

        let raw = match reader.sample() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(job_uuid = %job_uuid, error = %e, "counter read failed");
                continue;
            }
        };
        let now = std::time::Instant::now();
        let sample = build_sample(
            &job_uuid,
            clock.epoch_ms(),
            &raw,
            previous.as_ref().map(|(counters, at)| (counters, now.duration_since(*at))),
            &limits,
            gpu_indices.as_deref(),
        );
        previous = Some((raw, now));
        sink.record(sample);
    }
}

/// Derive a sample from a raw snapshot plus the previous tick's snapshot.
fn build_sample(
    job_uuid: &str,
    timestamp_ms: u64,
    raw: &RawCounters,
    previous: Option<(&RawCounters, Duration)>,
    limits: &LimitsSnapshot,
    gpu_indices: Option<&[u32]>,
) -> MetricsSample {
    let (cpu_percent, throttle_percent, io_rates, net_rates) = match previous {
        Some((prev, elapsed)) if !elapsed.is_zero() => {
            let elapsed_usec = elapsed.as_micros() as u64;
            let elapsed_secs = elapsed.as_secs_f64();
            let cpu_delta = raw.cpu.usage_usec.saturating_sub(prev.cpu.usage_usec);
            let cpu_percent = cpu_delta as f64 / elapsed_usec as f64 * 100.0;

            let periods = raw.cpu.nr_periods.saturating_sub(prev.cpu.nr_periods);
            let throttled = raw.cpu.nr_throttled.saturating_sub(prev.cpu.nr_throttled);
            let throttle_percent = if periods > 0 {
                throttled as f64 / periods as f64 * 100.0
            } else {
                0.0
            };

            let per_sec = |now: u64, before: u64| {
                (now.saturating_sub(before) as f64 / elapsed_secs) as u64
            };
            let io_rates = (
                per_sec(raw.io.read_bytes, prev.io.read_bytes),
                per_sec(raw.io.write_bytes, prev.io.write_bytes),
                per_sec(raw.io.read_ops, prev.io.read_ops),
                per_sec(raw.io.write_ops, prev.io.write_ops),
            );
            let net_rates = (
                per_sec(raw.network.rx_bytes, prev.network.rx_bytes),
                per_sec(raw.network.tx_bytes, prev.network.tx_bytes),
            );
            (cpu_percent, throttle_percent, io_rates, net_rates)
        }
        _ => (0.0, 0.0, (0, 0, 0, 0), (0, 0)),
    };

    let memory_percent = if limits.max_memory_bytes > 0 {
        raw.memory.current_bytes as f64 / limits.max_memory_bytes as f64 * 100.0
    } else {
        0.0
    };

    let gpu = raw
        .gpu
        .iter()
        .filter(|g| gpu_indices.map_or(true, |wanted| wanted.contains(&g.index)))
        .map(|g| GpuStats {
            index: g.index,
            utilization_percent: g.utilization_percent,
            memory_used_bytes: g.memory_used_bytes,
            memory_total_bytes: g.memory_total_bytes,
            temperature_celsius: g.temperature_celsius,
            power_watts: g.power_watts,
        })
        .collect();

    MetricsSample {
        job_uuid: job_uuid.to_string(),
        timestamp_ms,
        cpu: CpuStats {
            usage_percent: cpu_percent,
            user_usec: raw.cpu.user_usec,
            system_usec: raw.cpu.system_usec,
            throttle_percent,
        },
        memory: MemoryStats {
            current_bytes: raw.memory.current_bytes,
            peak_bytes: raw.memory.peak_bytes,
            anon_bytes: raw.memory.anon_bytes,
            file_bytes: raw.memory.file_bytes,
            major_faults: raw.memory.major_faults,
            oom_events: raw.memory.oom_events,
            usage_percent: memory_percent,
        },
        io: IoStats {
            read_bps: io_rates.0,
            write_bps: io_rates.1,
            read_iops: io_rates.2,
            write_iops: io_rates.3,
            total_read_bytes: raw.io.read_bytes,
            total_write_bytes: raw.io.write_bytes,
            total_read_ops: raw.io.read_ops,
            total_write_ops: raw.io.write_ops,
        },
        network: NetworkStats {
            rx_bytes: raw.network.rx_bytes,
            tx_bytes: raw.network.tx_bytes,
            rx_packets: raw.network.rx_packets,
            tx_packets: raw.network.tx_packets,
            rx_bps: net_rates.0,
            tx_bps: net_rates.1,
        },
        process: ProcessStats {
            process_count: raw.process.process_count,
            thread_count: raw.process.thread_count,
            open_fds: raw.process.open_fds,
        },
        gpu,
        limits: limits.clone(),
    }
}

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;
