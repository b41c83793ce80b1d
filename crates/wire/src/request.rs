// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from clients to the daemon.

use jl_core::FileUpload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for submitting a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunJobRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub max_cpu_percent: u32,
    #[serde(default)]
    pub max_memory_bytes: u64,
    #[serde(default)]
    pub max_iobps: u64,
    #[serde(default)]
    pub cpu_cores: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_indices: Option<Vec<u32>>,
    #[serde(default)]
    pub uploads: Vec<FileUpload>,
    /// RFC3339 start time, empty for immediate dispatch
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub secret_env: HashMap<String, String>,
    #[serde(default)]
    pub name: String,
}

/// Parameters for submitting a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    #[serde(default)]
    pub name: String,
    pub yaml_content: String,
    #[serde(default)]
    pub workflow_files: Vec<FileUpload>,
    #[serde(default)]
    pub total_jobs: usize,
}

/// Request from client to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Daemon status query
    Status,

    RunJob(RunJobRequest),

    StopJob { uuid: String },

    DeleteJob { uuid: String },

    DeleteAllJobs,

    ListJobs,

    GetJobStatus { uuid: String },

    /// Stream of log chunks (history then live)
    GetJobLogs {
        uuid: String,
        /// Buffer entries already delivered out of band
        #[serde(default)]
        skip_count: usize,
    },

    /// Stream of metric samples (history then live)
    GetJobMetrics { uuid: String },

    GetSystemStatus,

    StreamSystemMetrics {
        #[serde(default)]
        interval_seconds: u64,
        #[serde(default)]
        metric_types: Vec<String>,
    },

    RunWorkflow(RunWorkflowRequest),

    ListWorkflows {
        #[serde(default)]
        include_completed: bool,
    },

    GetWorkflowStatus { uuid: String },

    CreateVolume {
        name: String,
        volume_type: String,
        size_bytes: u64,
    },

    ListVolumes,

    RemoveVolume { name: String },

    CreateNetwork { name: String, cidr: String },

    ListNetworks,

    RemoveNetwork { name: String },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
