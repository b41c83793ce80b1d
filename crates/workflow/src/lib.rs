// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jl-workflow: Workflow file schema, dependency predicates, and graph
//! validation.

mod error;
mod predicate;
mod schema;
mod validate;

pub use error::WorkflowError;
pub use predicate::{CompiledPredicate, Tri};
pub use schema::{parse_yaml, WorkflowYaml};
pub use validate::{validate, ResourceCatalog};
