// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow validation and failure propagation end to end.

use super::harness::{stack, wait_for, SPEC_WAIT};
use jl_core::{JobStatus, WorkflowStatus};
use jl_engine::EngineError;
use jl_sandbox::FakeScript;

#[tokio::test]
async fn cyclic_dependency_rejected_with_cycle_path() {
    let s = stack(FakeScript::default());
    let err = s
        .executor
        .run(
            "cycle",
            r#"
jobs:
  a:
    command: /bin/true
    requires: { b: COMPLETED }
  b:
    command: /bin/true
    requires: { a: COMPLETED }
"#,
            Vec::new(),
        )
        .unwrap_err();

    match err {
        EngineError::ValidationFailed(message) => {
            assert_eq!(message, "circular dependency: a -> b");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    // Validation is total: nothing was created.
    assert!(s.manager.list().is_empty());
}

#[tokio::test]
async fn failed_dependency_cancels_downstream_and_fails_workflow() {
    // Every sandbox in this stack exits 1, so job `a` fails.
    let s = stack(FakeScript::failing(1, "boom\n"));
    let wf = s
        .executor
        .run(
            "cascade",
            r#"
jobs:
  a: { command: /bin/false }
  b:
    command: /bin/true
    requires: { a: COMPLETED }
"#,
            Vec::new(),
        )
        .unwrap();

    assert!(
        wait_for(SPEC_WAIT, || {
            s.executor.get(&wf).map(|w| w.status.is_terminal()).unwrap_or(false)
        })
        .await
    );

    let workflow = s.executor.get(&wf).unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert_eq!(workflow.failed_jobs, 1);
    assert_eq!(workflow.completed_jobs, 0);

    let jobs = s.executor.jobs_of(&wf);
    let a = jobs.iter().find(|j| j.name == "a").unwrap();
    let b = jobs.iter().find(|j| j.name == "b").unwrap();
    assert_eq!(a.status, JobStatus::Failed);
    // b never ran: cancelled straight from pending, no sandbox prepared.
    assert_eq!(b.status, JobStatus::Canceled);
    assert!(b.started_at_ms.is_none());
    assert_eq!(s.driver.prepared_specs().len(), 1);
}

#[tokio::test]
async fn independent_branch_proceeds_past_failure() {
    let s = stack(FakeScript::failing(1, ""));
    let wf = s
        .executor
        .run(
            "branches",
            r#"
jobs:
  left: { command: /bin/false }
  right: { command: /bin/false }
  after_right:
    command: /bin/true
    requires: "right IN (COMPLETED, FAILED)"
"#,
            Vec::new(),
        )
        .unwrap();

    assert!(
        wait_for(SPEC_WAIT, || {
            s.executor.get(&wf).map(|w| w.status.is_terminal()).unwrap_or(false)
        })
        .await
    );

    // after_right's predicate tolerates right failing, so it still ran
    // (and, in this stack, also failed).
    let jobs = s.executor.jobs_of(&wf);
    let after = jobs.iter().find(|j| j.name == "after_right").unwrap();
    assert_eq!(after.status, JobStatus::Failed);
    assert!(after.started_at_ms.is_some());
    assert_eq!(s.executor.get(&wf).unwrap().status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn workflow_of_independent_jobs_completes() {
    let s = stack(FakeScript::succeeding("done\n"));
    let wf = s
        .executor
        .run(
            "parallel",
            r#"
jobs:
  one: { command: /bin/true }
  two: { command: /bin/true }
  three: { command: /bin/true }
"#,
            Vec::new(),
        )
        .unwrap();

    assert!(
        wait_for(SPEC_WAIT, || {
            s.executor
                .get(&wf)
                .map(|w| w.status == WorkflowStatus::Completed)
                .unwrap_or(false)
        })
        .await
    );
    let workflow = s.executor.get(&wf).unwrap();
    assert_eq!(workflow.completed_jobs, 3);
    assert_eq!(workflow.failed_jobs, 0);
}

#[tokio::test]
async fn unknown_volume_reference_rejected() {
    let s = stack(FakeScript::default());
    let err = s
        .executor
        .run(
            "volumes",
            r#"
jobs:
  a:
    command: /bin/true
    volumes: [missing]
"#,
            Vec::new(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed(_)));
    assert!(err.to_string().contains("missing"));
}
