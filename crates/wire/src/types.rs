// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTO types shared between requests and responses.

use jl_core::{DependencySpec, JobStatus, ResourceLimits, WorkflowStatus};
use serde::{Deserialize, Serialize};

/// Job entry for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub uuid: String,
    pub name: String,
    pub status: JobStatus,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl From<&jl_core::Job> for JobSummary {
    fn from(job: &jl_core::Job) -> Self {
        Self {
            uuid: job.uuid.clone(),
            name: job.name.clone(),
            status: job.status,
            command: job.command.clone(),
            args: job.args.clone(),
            started_at_ms: job.started_at_ms,
            ended_at_ms: job.ended_at_ms,
            limits: job.limits.clone(),
        }
    }
}

/// Volume entry for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub size_bytes: u64,
    pub job_count: u32,
}

/// Workflow entry for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub uuid: String,
    pub name: String,
    pub status: WorkflowStatus,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub created_at_ms: u64,
}

impl From<&jl_core::Workflow> for WorkflowSummary {
    fn from(workflow: &jl_core::Workflow) -> Self {
        Self {
            uuid: workflow.uuid.clone(),
            name: workflow.name.clone(),
            status: workflow.status,
            total_jobs: workflow.total_jobs,
            completed_jobs: workflow.completed_jobs,
            failed_jobs: workflow.failed_jobs,
            created_at_ms: workflow.created_at_ms,
        }
    }
}

/// One job inside a workflow status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJobEntry {
    pub name: String,
    pub uuid: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencySpec>,
}

/// Full workflow status: record plus its jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDetail {
    pub workflow: WorkflowSummary,
    pub jobs: Vec<WorkflowJobEntry>,
}

// -- system status --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub kernel: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub cores: usize,
    pub usage_percent: f64,
    #[serde(default)]
    pub per_core_percent: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceInfo {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub host: HostInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    #[serde(default)]
    pub disks: Vec<DiskInfo>,
    #[serde(default)]
    pub networks: Vec<NetworkInterfaceInfo>,
    #[serde(default)]
    pub top_by_cpu: Vec<ProcessInfo>,
    #[serde(default)]
    pub top_by_memory: Vec<ProcessInfo>,
    /// Cloud provider detected from DMI strings, empty on bare metal
    #[serde(default)]
    pub cloud: String,
    pub server_version: String,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
