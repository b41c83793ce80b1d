// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow record and per-job dependency declarations.

use crate::job::{FileUpload, JobStatus, ResourceLimits};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a workflow. Part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

crate::simple_display! {
    WorkflowStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Canceled => "CANCELED",
    }
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Canceled
        )
    }
}

/// Dependency predicate attached to a workflow job.
///
/// The direct form maps dependency names to the terminal status each must
/// reach. The expression form is a boolean formula over `name=STATUS` atoms
/// combined with `AND`/`OR`/`NOT`/`IN`, parsed by the workflow crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Direct(IndexMap<String, JobStatus>),
    Expression(String),
}

impl DependencySpec {
    /// Names of the workflow jobs this predicate references.
    ///
    /// For expressions this is a lexical scan for `name=` / `name IN` atom
    /// heads; full parsing lives in the workflow crate.
    pub fn referenced_jobs(&self) -> Vec<String> {
        match self {
            DependencySpec::Direct(deps) => deps.keys().cloned().collect(),
            DependencySpec::Expression(expr) => {
                let mut names = Vec::new();
                let mut chars = expr.char_indices().peekable();
                while let Some((start, c)) = chars.next() {
                    if !(c.is_alphanumeric() || c == '_' || c == '-') {
                        continue;
                    }
                    let mut end = start + c.len_utf8();
                    while let Some(&(i, c2)) = chars.peek() {
                        if c2.is_alphanumeric() || c2 == '_' || c2 == '-' {
                            end = i + c2.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let word = &expr[start..end];
                    let upper = word.to_ascii_uppercase();
                    if matches!(upper.as_str(), "AND" | "OR" | "NOT" | "IN")
                        || JobStatus::parse(&upper).is_some()
                    {
                        continue;
                    }
                    if !names.iter().any(|n| n == word) {
                        names.push(word.to_string());
                    }
                }
                names
            }
        }
    }
}

/// Per-job specification inside a workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJobSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub uploads: Vec<FileUpload>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<DependencySpec>,
}

/// A workflow instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Opaque 36-character identifier
    pub uuid: String,
    pub name: String,
    pub status: WorkflowStatus,
    pub total_jobs: usize,
    #[serde(default)]
    pub completed_jobs: usize,
    #[serde(default)]
    pub failed_jobs: usize,
    /// Original YAML text as submitted
    #[serde(default)]
    pub yaml_source: String,
    /// Job name → spec, in declaration order
    pub jobs: IndexMap<String, WorkflowJobSpec>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, jobs: IndexMap<String, WorkflowJobSpec>, created_at_ms: u64) -> Self {
        let total_jobs = jobs.len();
        Self {
            uuid: crate::job::new_uuid(),
            name: name.into(),
            status: WorkflowStatus::Pending,
            total_jobs,
            completed_jobs: 0,
            failed_jobs: 0,
            yaml_source: String::new(),
            jobs,
            created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
