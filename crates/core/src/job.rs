// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Length of a full job identifier (canonical UUID text form).
pub const UUID_LEN: usize = 36;

/// Generate a fresh 36-character job identifier.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Status of a job. Part of the wire contract — the serialized names
/// must stay exactly as enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, not yet dispatched
    Pending,
    /// Deferred to a future start time
    Scheduled,
    /// Sandbox construction in progress
    Initializing,
    /// Child process executing
    Running,
    /// Exited with code 0
    Completed,
    /// Exited non-zero or sandbox failure
    Failed,
    /// Stopped by operator while running
    Stopped,
    /// Cancelled before it ever ran
    Canceled,
}

crate::simple_display! {
    JobStatus {
        Pending => "PENDING",
        Scheduled => "SCHEDULED",
        Initializing => "INITIALIZING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Stopped => "STOPPED",
        Canceled => "CANCELED",
    }
}

impl JobStatus {
    /// Check if this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped | JobStatus::Canceled
        )
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Statuses only move forward: a terminal status accepts nothing,
    /// and a job never returns to an earlier phase.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Pending => matches!(next, Scheduled | Initializing | Failed | Canceled),
            Scheduled => matches!(next, Initializing | Failed | Canceled),
            Initializing => matches!(next, Running | Failed | Stopped | Canceled),
            Running => matches!(next, Completed | Failed | Stopped),
            Completed | Failed | Stopped | Canceled => false,
        }
    }

    /// Parse the wire-form status name.
    pub fn parse(s: &str) -> Option<JobStatus> {
        use JobStatus::*;
        match s {
            "PENDING" => Some(Pending),
            "SCHEDULED" => Some(Scheduled),
            "INITIALIZING" => Some(Initializing),
            "RUNNING" => Some(Running),
            "COMPLETED" => Some(Completed),
            "FAILED" => Some(Failed),
            "STOPPED" => Some(Stopped),
            "CANCELED" => Some(Canceled),
            _ => None,
        }
    }
}

/// Resource limits applied to a job's sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU ceiling in percent of one core (0 = unlimited)
    #[serde(default)]
    pub max_cpu_percent: u32,
    /// Memory ceiling in bytes (0 = unlimited)
    #[serde(default)]
    pub max_memory_bytes: u64,
    /// IO bandwidth ceiling in bytes/second (0 = unlimited)
    #[serde(default)]
    pub max_iobps: u64,
    /// CPU core set expression (e.g. "0-3,7"), empty = all cores
    #[serde(default)]
    pub cpu_cores: String,
    /// GPU device indices to expose, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_indices: Option<Vec<u32>>,
}

/// A file staged into the job's working directory before start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub path: String,
    #[serde(default)]
    pub content: Vec<u8>,
    pub mode: u32,
    #[serde(default)]
    pub is_dir: bool,
}

/// Environment map whose values never appear in logs or debug output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretEnv(pub HashMap<String, String>);

impl SecretEnv {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Key/value pairs for injection into the sandbox environment.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Debug for SecretEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys are safe to show; values are not.
        f.debug_map().entries(self.0.keys().map(|k| (k, "<redacted>"))).finish()
    }
}

/// A job instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque 36-character identifier
    pub uuid: String,
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub status: JobStatus,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    /// Valid only in terminal states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Runtime image mounted into the sandbox, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    /// Names of volumes mounted into the sandbox
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Files staged into the working directory, in upload order
    #[serde(default)]
    pub uploads: Vec<FileUpload>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "SecretEnv::is_empty")]
    pub secret_env: SecretEnv,
    /// Set when the job belongs to a workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_uuid: Option<String>,
    /// Dependency predicate carried from the workflow spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<crate::workflow::DependencySpec>,
    /// Epoch ms of the requested start time for deferred jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at_ms: Option<u64>,
}

impl Job {
    /// Create a new pending job with a fresh uuid.
    pub fn new(name: impl Into<String>, command: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            uuid: new_uuid(),
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            status: JobStatus::Pending,
            created_at_ms,
            started_at_ms: None,
            ended_at_ms: None,
            exit_code: None,
            limits: ResourceLimits::default(),
            runtime_tag: None,
            network_name: None,
            volumes: Vec::new(),
            uploads: Vec::new(),
            env: HashMap::new(),
            secret_env: SecretEnv::default(),
            workflow_uuid: None,
            dependencies: None,
            scheduled_at_ms: None,
        }
    }

    /// Check if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the job is currently executing (or being set up)
    pub fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Initializing | JobStatus::Running)
    }

    /// Exit code, readable only once the job is terminal.
    pub fn final_exit_code(&self) -> Option<i32> {
        if self.is_terminal() {
            self.exit_code
        } else {
            None
        }
    }

    /// Apply a status transition, recording start/end instants.
    ///
    /// Returns false (and leaves the job untouched) when the transition
    /// is not allowed by the status machine.
    pub fn transition(&mut self, next: JobStatus, epoch_ms: u64) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        if next == JobStatus::Running && self.started_at_ms.is_none() {
            self.started_at_ms = Some(epoch_ms);
        }
        if next.is_terminal() {
            self.ended_at_ms = Some(epoch_ms);
        }
        self.status = next;
        true
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            uuid: String = crate::job::new_uuid(),
            name: String = "test-job",
            command: String = "/bin/true",
        }
        set {
            args: Vec<String> = Vec::new(),
            status: JobStatus = JobStatus::Pending,
            created_at_ms: u64 = 1_000_000,
            limits: ResourceLimits = ResourceLimits::default(),
            volumes: Vec<String> = Vec::new(),
            uploads: Vec<FileUpload> = Vec::new(),
            env: HashMap<String, String> = HashMap::new(),
            secret_env: SecretEnv = SecretEnv::default(),
        }
        option {
            started_at_ms: u64 = None,
            ended_at_ms: u64 = None,
            exit_code: i32 = None,
            runtime_tag: String = None,
            network_name: String = None,
            workflow_uuid: String = None,
            dependencies: crate::workflow::DependencySpec = None,
            scheduled_at_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
