// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Store errors surface as-is where they already carry the right category;
//! the lifecycle manager wraps everything else with operation context.

use jl_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("ambiguous prefix {prefix}: matches {}", .candidates.join(", "))]
    Ambiguous { prefix: String, candidates: Vec<String> },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0} unavailable: {1}")]
    Unavailable(&'static str, String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        EngineError::NotFound { kind, key: key.into() }
    }

    /// Wrap a store error with operation context, preserving its category
    /// where the taxonomy distinguishes one.
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { kind, key } => EngineError::NotFound { kind, key },
            StoreError::AlreadyExists { kind, key } => {
                EngineError::Conflict(format!("{kind} already exists: {key}"))
            }
            StoreError::VolumeInUse { .. } | StoreError::NetworkInUse { .. } => {
                EngineError::InvalidState(source.to_string())
            }
            StoreError::AlreadyAssigned { .. } => EngineError::Conflict(source.to_string()),
            StoreError::InvalidCidr { .. } | StoreError::InvalidGateway { .. } => {
                EngineError::ValidationFailed(source.to_string())
            }
            other => EngineError::Store { context: context.into(), source: other },
        }
    }
}

impl From<jl_workflow::WorkflowError> for EngineError {
    fn from(e: jl_workflow::WorkflowError) -> Self {
        EngineError::ValidationFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_keeps_category() {
        let err = EngineError::store("get job", StoreError::NotFound { kind: "job", key: "x".into() });
        assert!(matches!(err, EngineError::NotFound { kind: "job", .. }));
    }

    #[test]
    fn store_in_use_becomes_invalid_state() {
        let err = EngineError::store(
            "remove volume",
            StoreError::VolumeInUse { name: "data".into(), count: 2 },
        );
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(err.to_string(), "volume data still in use by 2 job(s)");
    }

    #[test]
    fn ambiguous_lists_candidates() {
        let err = EngineError::Ambiguous {
            prefix: "f47a".into(),
            candidates: vec!["f47a-1".into(), "f47a-2".into()],
        };
        assert!(err.to_string().contains("f47a-1, f47a-2"));
    }
}
