// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn workflow_status_wire_names() {
    let json = serde_json::to_string(&WorkflowStatus::Canceled).unwrap();
    assert_eq!(json, "\"CANCELED\"");
}

#[test]
fn direct_spec_referenced_jobs() {
    let mut deps = IndexMap::new();
    deps.insert("extract".to_string(), JobStatus::Completed);
    deps.insert("load".to_string(), JobStatus::Completed);
    let spec = DependencySpec::Direct(deps);
    assert_eq!(spec.referenced_jobs(), vec!["extract", "load"]);
}

#[test]
fn expression_spec_referenced_jobs() {
    let spec = DependencySpec::Expression(
        "extract=COMPLETED AND NOT load=FAILED OR merge IN (COMPLETED, STOPPED)".to_string(),
    );
    assert_eq!(spec.referenced_jobs(), vec!["extract", "load", "merge"]);
}

#[test]
fn expression_skips_keywords_and_statuses() {
    let spec = DependencySpec::Expression("a=COMPLETED AND b=FAILED".to_string());
    assert_eq!(spec.referenced_jobs(), vec!["a", "b"]);
}

#[test]
fn dependency_spec_serde_direct() {
    let json = r#"{"build": "COMPLETED"}"#;
    let spec: DependencySpec = serde_json::from_str(json).unwrap();
    match spec {
        DependencySpec::Direct(deps) => assert_eq!(deps.get("build"), Some(&JobStatus::Completed)),
        other => panic!("expected direct form, got {:?}", other),
    }
}

#[test]
fn dependency_spec_serde_expression() {
    let json = r#""a=COMPLETED OR b=COMPLETED""#;
    let spec: DependencySpec = serde_json::from_str(json).unwrap();
    assert!(matches!(spec, DependencySpec::Expression(_)));
}

#[test]
fn new_workflow_counts_jobs() {
    let mut jobs = IndexMap::new();
    jobs.insert("a".to_string(), WorkflowJobSpec { command: "/bin/true".into(), ..Default::default() });
    jobs.insert("b".to_string(), WorkflowJobSpec { command: "/bin/true".into(), ..Default::default() });
    let wf = Workflow::new("nightly", jobs, 1_000);
    assert_eq!(wf.total_jobs, 2);
    assert_eq!(wf.status, WorkflowStatus::Pending);
    assert_eq!(wf.uuid.len(), crate::job::UUID_LEN);
}
