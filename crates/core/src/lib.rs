// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jl-core: Domain types for the Joblet job-execution service

pub mod macros;

pub mod clock;
pub mod event;
pub mod job;
pub mod metrics;
pub mod network;
pub mod volume;
pub mod workflow;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::Event;
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{new_uuid, FileUpload, Job, JobStatus, ResourceLimits, SecretEnv, UUID_LEN};
pub use metrics::{
    CpuStats, GpuStats, IoStats, LimitsSnapshot, MemoryStats, MetricsSample, NetworkStats,
    ProcessStats,
};
pub use network::{JobNetworkAllocation, NetworkConfig, NetworkType};
pub use volume::{Volume, VolumeType};
pub use workflow::{DependencySpec, Workflow, WorkflowJobSpec, WorkflowStatus};
