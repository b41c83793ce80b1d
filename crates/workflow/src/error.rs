// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow parsing and validation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to parse workflow yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("workflow has no jobs")]
    Empty,

    #[error("invalid status {status:?} in requires of job {job}")]
    InvalidStatus { job: String, status: String },

    #[error("circular dependency: {0}")]
    CircularDependency(String),

    #[error("job {job} references unknown volume {volume}")]
    UnknownVolume { job: String, volume: String },

    #[error("job {job} references unknown network {network}")]
    UnknownNetwork { job: String, network: String },

    #[error("job {job} references unknown runtime {runtime}")]
    UnknownRuntime { job: String, runtime: String },

    #[error("job {job} depends on unknown job {dependency}")]
    UnknownDependency { job: String, dependency: String },

    #[error("invalid dependency expression for job {job}: {reason}")]
    BadExpression { job: String, reason: String },
}
