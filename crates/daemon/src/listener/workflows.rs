// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow request handlers.

use super::{error_response, ListenCtx};
use jl_wire::{Response, RunWorkflowRequest, WorkflowDetail, WorkflowJobEntry, WorkflowSummary};

pub(crate) fn handle_run_workflow(ctx: &ListenCtx, run: RunWorkflowRequest) -> Response {
    match ctx.executor.run(&run.name, &run.yaml_content, run.workflow_files) {
        Ok(uuid) => Response::WorkflowStarted { uuid },
        Err(e) => error_response(&e),
    }
}

pub(crate) fn handle_list_workflows(ctx: &ListenCtx, include_completed: bool) -> Response {
    let mut workflows: Vec<WorkflowSummary> = ctx
        .executor
        .list(include_completed)
        .iter()
        .map(WorkflowSummary::from)
        .collect();
    workflows.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
    Response::Workflows { workflows }
}

pub(crate) fn handle_workflow_status(ctx: &ListenCtx, uuid: &str) -> Response {
    let workflow = match ctx.executor.get(uuid) {
        Ok(workflow) => workflow,
        Err(e) => return error_response(&e),
    };

    let mut jobs: Vec<WorkflowJobEntry> = ctx
        .executor
        .jobs_of(uuid)
        .into_iter()
        .map(|job| WorkflowJobEntry {
            name: job.name.clone(),
            uuid: job.uuid.clone(),
            status: job.status,
            dependencies: job.dependencies.clone(),
        })
        .collect();
    // Present jobs in the workflow's declaration order.
    jobs.sort_by_key(|entry| workflow.jobs.get_index_of(entry.name.as_str()));

    Response::Workflow {
        detail: Box::new(WorkflowDetail { workflow: WorkflowSummary::from(&workflow), jobs }),
    }
}
