// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML schema for workflow files.
//!
//! ```yaml
//! name: nightly-etl
//! jobs:
//!   extract:
//!     command: python3
//!     args: ["extract.py"]
//!     runtime: python-3.11
//!     volumes: [data]
//!   load:
//!     command: python3
//!     args: ["load.py"]
//!     requires:
//!       extract: COMPLETED
//! ```

use crate::error::WorkflowError;
use indexmap::IndexMap;
use jl_core::{DependencySpec, FileUpload, JobStatus, ResourceLimits, WorkflowJobSpec};
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level workflow file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowYaml {
    #[serde(default)]
    pub name: Option<String>,
    pub jobs: IndexMap<String, JobYaml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobYaml {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub resources: Option<ResourcesYaml>,
    #[serde(default)]
    pub uploads: Vec<UploadYaml>,
    #[serde(default)]
    pub requires: Option<RequiresYaml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourcesYaml {
    #[serde(default)]
    pub max_cpu_percent: u32,
    #[serde(default)]
    pub max_memory_bytes: u64,
    #[serde(default)]
    pub max_iobps: u64,
    #[serde(default)]
    pub cpu_cores: String,
    #[serde(default)]
    pub gpu_indices: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadYaml {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_mode")]
    pub mode: u32,
    #[serde(default)]
    pub is_dir: bool,
}

fn default_mode() -> u32 {
    0o644
}

/// `requires` accepts either a map of `dep: STATUS` or an expression string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequiresYaml {
    Direct(IndexMap<String, String>),
    Expression(String),
}

/// Parse a workflow file into per-job specs.
///
/// Status names in the direct `requires` form are validated here; the
/// expression form is validated (and compiled) during graph validation.
pub fn parse_yaml(yaml: &str) -> Result<(Option<String>, IndexMap<String, WorkflowJobSpec>), WorkflowError> {
    let parsed: WorkflowYaml = serde_yaml::from_str(yaml)?;
    if parsed.jobs.is_empty() {
        return Err(WorkflowError::Empty);
    }

    let mut jobs = IndexMap::new();
    for (name, job) in parsed.jobs {
        let requires = match job.requires {
            None => None,
            Some(RequiresYaml::Expression(expr)) => Some(DependencySpec::Expression(expr)),
            Some(RequiresYaml::Direct(deps)) => {
                let mut direct = IndexMap::new();
                for (dep, status) in deps {
                    let parsed_status = JobStatus::parse(&status.to_ascii_uppercase())
                        .ok_or_else(|| WorkflowError::InvalidStatus {
                            job: name.clone(),
                            status: status.clone(),
                        })?;
                    direct.insert(dep, parsed_status);
                }
                Some(DependencySpec::Direct(direct))
            }
        };

        let limits = job.resources.map(|r| ResourceLimits {
            max_cpu_percent: r.max_cpu_percent,
            max_memory_bytes: r.max_memory_bytes,
            max_iobps: r.max_iobps,
            cpu_cores: r.cpu_cores,
            gpu_indices: r.gpu_indices,
        });

        let uploads = job
            .uploads
            .into_iter()
            .map(|u| FileUpload {
                path: u.path,
                content: u.content.into_bytes(),
                mode: u.mode,
                is_dir: u.is_dir,
            })
            .collect();

        jobs.insert(
            name,
            WorkflowJobSpec {
                command: job.command,
                args: job.args,
                limits: limits.unwrap_or_default(),
                runtime: job.runtime,
                network: job.network,
                volumes: job.volumes,
                uploads,
                env: job.env,
                requires,
            },
        );
    }
    Ok((parsed.name, jobs))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
