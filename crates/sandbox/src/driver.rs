// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox capability traits and the raw counter types read from them.

use async_trait::async_trait;
use jl_core::{FileUpload, ResourceLimits, SecretEnv};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to prepare sandbox: {0}")]
    Prepare(String),

    #[error("failed to start process: {0}")]
    Start(String),

    #[error("failed to signal process: {0}")]
    Signal(String),

    #[error("stdio already attached")]
    StdioTaken,

    #[error("process not started")]
    NotStarted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything an implementation needs to construct a job's sandbox.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub job_uuid: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Injected into the child environment, never logged
    pub secret_env: SecretEnv,
    pub limits: ResourceLimits,
    pub workdir: PathBuf,
    pub uploads: Vec<FileUpload>,
    /// Names of volumes to mount
    pub volumes: Vec<String>,
    /// Runtime image to overlay, if any
    pub runtime: Option<String>,
    /// IP address to attach, empty for host/none networks
    pub ip_address: String,
    pub hostname: String,
}

/// Byte stream carrying one of the child's output fds.
pub type StdioReader = Box<dyn AsyncRead + Send + Unpin>;

/// Cumulative raw counters snapshotted from a sandbox.
///
/// All values are totals since process start; the metrics collector derives
/// rates from successive snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCounters {
    pub cpu: RawCpu,
    pub memory: RawMemory,
    pub io: RawIo,
    pub network: RawNetwork,
    pub process: RawProcess,
    pub gpu: Vec<RawGpu>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCpu {
    pub usage_usec: u64,
    pub user_usec: u64,
    pub system_usec: u64,
    pub nr_periods: u64,
    pub nr_throttled: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMemory {
    pub current_bytes: u64,
    pub peak_bytes: u64,
    pub anon_bytes: u64,
    pub file_bytes: u64,
    pub major_faults: u64,
    pub oom_events: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawIo {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawNetwork {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawProcess {
    pub process_count: u64,
    pub thread_count: u64,
    pub open_fds: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawGpu {
    pub index: u32,
    pub utilization_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub temperature_celsius: u32,
    pub power_watts: f64,
}

/// Live resource counters for a started sandbox.
pub trait ResourceReader: Send + Sync {
    /// Snapshot all counters. A dead process yields the last-known or
    /// zeroed values rather than an error.
    fn sample(&self) -> Result<RawCounters, SandboxError>;
}

/// Factory constructing sandboxes from job specs.
#[async_trait]
pub trait SandboxDriver: Send + Sync {
    async fn prepare(&self, spec: SandboxSpec) -> Result<Box<dyn Sandbox>, SandboxError>;
}

/// One prepared (and possibly running) sandboxed process.
#[async_trait]
pub trait Sandbox: Send {
    /// Launch the child. Returns its pid and a counter reader.
    async fn start(&mut self) -> Result<(u32, Arc<dyn ResourceReader>), SandboxError>;

    /// Deliver a signal to the child.
    fn signal(&self, signal: i32) -> Result<(), SandboxError>;

    /// Wait for the child to exit and return its exit code.
    ///
    /// A signal-terminated child reports `128 + signo`.
    async fn wait(&mut self) -> Result<i32, SandboxError>;

    /// Take the stdout/stderr readers. Callable once, after `start`.
    fn attach_stdio(&mut self) -> Result<(StdioReader, StdioReader), SandboxError>;

    /// Release sandbox resources. Idempotent.
    async fn teardown(&mut self) -> Result<(), SandboxError>;
}
