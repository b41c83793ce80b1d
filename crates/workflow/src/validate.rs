// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow graph validation.
//!
//! Validation is total: it either returns the compiled predicates for
//! execution, or a validation error — execution is never entered with a
//! cyclic or dangling graph.

use crate::error::WorkflowError;
use crate::predicate::CompiledPredicate;
use indexmap::IndexMap;
use jl_core::WorkflowJobSpec;
use std::collections::HashMap;

/// Existence checks the validator runs against the rest of the system.
pub trait ResourceCatalog {
    fn volume_exists(&self, name: &str) -> bool;
    fn network_exists(&self, name: &str) -> bool;
    fn runtime_exists(&self, name: &str) -> bool;
}

/// Validate a workflow's job graph and compile its predicates.
///
/// Checks, in order: predicate syntax, dependency-name existence, resource
/// references (volumes, networks, runtimes), and acyclicity.
pub fn validate(
    jobs: &IndexMap<String, WorkflowJobSpec>,
    catalog: &dyn ResourceCatalog,
) -> Result<HashMap<String, CompiledPredicate>, WorkflowError> {
    let mut predicates = HashMap::new();
    for (name, spec) in jobs {
        if let Some(requires) = &spec.requires {
            let compiled = CompiledPredicate::compile(requires).map_err(|reason| {
                WorkflowError::BadExpression { job: name.clone(), reason }
            })?;
            for dep in compiled.referenced_jobs() {
                if !jobs.contains_key(&dep) {
                    return Err(WorkflowError::UnknownDependency {
                        job: name.clone(),
                        dependency: dep,
                    });
                }
            }
            predicates.insert(name.clone(), compiled);
        }

        for volume in &spec.volumes {
            if !catalog.volume_exists(volume) {
                return Err(WorkflowError::UnknownVolume {
                    job: name.clone(),
                    volume: volume.clone(),
                });
            }
        }
        if let Some(network) = &spec.network {
            if !catalog.network_exists(network) {
                return Err(WorkflowError::UnknownNetwork {
                    job: name.clone(),
                    network: network.clone(),
                });
            }
        }
        if let Some(runtime) = &spec.runtime {
            if !catalog.runtime_exists(runtime) {
                return Err(WorkflowError::UnknownRuntime {
                    job: name.clone(),
                    runtime: runtime.clone(),
                });
            }
        }
    }

    detect_cycles(jobs, &predicates)?;
    Ok(predicates)
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Depth-first search with a grey set; the error names the cycle path.
fn detect_cycles(
    jobs: &IndexMap<String, WorkflowJobSpec>,
    predicates: &HashMap<String, CompiledPredicate>,
) -> Result<(), WorkflowError> {
    let mut colors: HashMap<&str, Color> =
        jobs.keys().map(|name| (name.as_str(), Color::White)).collect();

    for name in jobs.keys() {
        if colors.get(name.as_str()) == Some(&Color::White) {
            let mut stack = Vec::new();
            visit(name, predicates, &mut colors, &mut stack)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    name: &'a str,
    predicates: &'a HashMap<String, CompiledPredicate>,
    colors: &mut HashMap<&'a str, Color>,
    stack: &mut Vec<&'a str>,
) -> Result<(), WorkflowError> {
    colors.insert(name, Color::Grey);
    stack.push(name);

    if let Some(predicate) = predicates.get(name) {
        for dep in predicate.referenced_jobs() {
            let Some((dep_key, _)) = predicates.get_key_value(dep.as_str()) else {
                // Dependency without its own requires clause cannot extend a cycle.
                continue;
            };
            match colors.get(dep_key.as_str()) {
                Some(Color::Grey) => {
                    let start = stack.iter().position(|n| *n == dep_key.as_str()).unwrap_or(0);
                    let path = stack[start..].join(" -> ");
                    return Err(WorkflowError::CircularDependency(path));
                }
                Some(Color::White) => visit(dep_key.as_str(), predicates, colors, stack)?,
                _ => {}
            }
        }
    }

    stack.pop();
    colors.insert(name, Color::Black);
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
