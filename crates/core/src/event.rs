// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published on the job bus.

use crate::job::JobStatus;
use crate::metrics::MetricsSample;
use crate::workflow::WorkflowStatus;
use serde::{Deserialize, Serialize};

/// Events fanned out to subscribers of the `"jobs"` topic.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
/// Unknown type tags deserialize to `Custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "job:created")]
    JobCreated { uuid: String, name: String },

    #[serde(rename = "job:updated")]
    JobUpdated {
        uuid: String,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// A fragment of a job's stdout/stderr
    #[serde(rename = "log:chunk")]
    LogChunk {
        uuid: String,
        bytes: Vec<u8>,
        /// Producer-side sequence, strictly increasing per process
        sequence: u64,
    },

    #[serde(rename = "metrics:sample")]
    MetricsSample { uuid: String, sample: Box<MetricsSample> },

    #[serde(rename = "job:deleted")]
    JobDeleted { uuid: String },

    #[serde(rename = "workflow:updated")]
    WorkflowUpdated {
        uuid: String,
        status: WorkflowStatus,
        completed_jobs: usize,
        failed_jobs: usize,
    },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// The job or workflow uuid this event concerns.
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Event::JobCreated { uuid, .. }
            | Event::JobUpdated { uuid, .. }
            | Event::LogChunk { uuid, .. }
            | Event::MetricsSample { uuid, .. }
            | Event::JobDeleted { uuid }
            | Event::WorkflowUpdated { uuid, .. } => Some(uuid),
            Event::Custom => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
