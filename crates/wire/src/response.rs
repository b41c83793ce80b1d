// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses from the daemon to clients.

use crate::types::{
    JobSummary, SystemStatus, VolumeSummary, WorkflowDetail, WorkflowSummary,
};
use jl_core::{Job, JobStatus, MetricsSample, NetworkConfig};
use serde::{Deserialize, Serialize};

/// Machine-readable error category, mirroring standard RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    Unavailable,
    Canceled,
    Internal,
}

jl_core::simple_display! {
    ErrorCode {
        NotFound => "not_found",
        InvalidArgument => "invalid_argument",
        FailedPrecondition => "failed_precondition",
        Unavailable => "unavailable",
        Canceled => "canceled",
        Internal => "internal",
    }
}

/// Response from daemon to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon status
    Status {
        uptime_secs: u64,
        jobs_active: usize,
        version: String,
    },

    /// Error response
    Error { code: ErrorCode, message: String },

    /// Job accepted (RunJob)
    JobStarted {
        uuid: String,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scheduled_at_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at_ms: Option<u64>,
    },

    /// Final (or imminent) status after StopJob
    JobStopped { status: JobStatus },

    /// DeleteJob result
    JobDeleted { success: bool, message: String },

    /// DeleteAllJobs result
    JobsDeleted {
        deleted_count: usize,
        skipped_count: usize,
        message: String,
    },

    /// Job listing
    Jobs { jobs: Vec<JobSummary> },

    /// Full job record
    Job { job: Box<Job> },

    /// One frame of a log stream
    LogChunk { bytes: Vec<u8> },

    /// One frame of a metrics stream
    MetricsSample { sample: Box<MetricsSample> },

    /// System status snapshot (also the stream frame shape)
    SystemStatus { status: Box<SystemStatus> },

    /// Workflow accepted
    WorkflowStarted { uuid: String },

    /// Workflow listing
    Workflows { workflows: Vec<WorkflowSummary> },

    /// Workflow with its jobs
    Workflow { detail: Box<WorkflowDetail> },

    /// Volume listing
    Volumes { volumes: Vec<VolumeSummary> },

    /// Network listing
    Networks { networks: Vec<NetworkConfig> },

    /// Terminates any streaming response
    StreamEnd,
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error { code, message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
