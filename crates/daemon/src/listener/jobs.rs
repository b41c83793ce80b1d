// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job request handlers.

use super::{error_response, ListenCtx};
use jl_core::{Clock, Job, ResourceLimits, SecretEnv, SystemClock};
use jl_engine::EngineError;
use jl_wire::{ErrorCode, JobSummary, Response, RunJobRequest};

pub(crate) fn handle_run_job(ctx: &ListenCtx, run: RunJobRequest) -> Response {
    if run.command.is_empty() {
        return Response::error(ErrorCode::InvalidArgument, "command must not be empty");
    }

    let scheduled_at_ms = if run.schedule.is_empty() {
        None
    } else {
        match chrono::DateTime::parse_from_rfc3339(&run.schedule) {
            Ok(at) => Some(at.timestamp_millis().max(0) as u64),
            Err(e) => {
                return Response::error(
                    ErrorCode::InvalidArgument,
                    format!("invalid schedule {:?}: {e}", run.schedule),
                );
            }
        }
    };

    // Referenced resources must exist before the job record is created.
    for volume in &run.volumes {
        if !ctx.volumes.exists(volume) {
            return error_response(&EngineError::not_found("volume", volume));
        }
    }
    if !run.network.is_empty() && !ctx.networks.exists(&run.network) {
        return error_response(&EngineError::not_found("network", &run.network));
    }

    let name = if run.name.is_empty() {
        run.command
            .rsplit('/')
            .next()
            .unwrap_or(run.command.as_str())
            .to_string()
    } else {
        run.name.clone()
    };

    let mut job = Job::new(name, &run.command, SystemClock.epoch_ms());
    job.args = run.args;
    job.limits = ResourceLimits {
        max_cpu_percent: run.max_cpu_percent,
        max_memory_bytes: run.max_memory_bytes,
        max_iobps: run.max_iobps,
        cpu_cores: run.cpu_cores,
        gpu_indices: run.gpu_indices,
    };
    job.uploads = run.uploads;
    job.volumes = run.volumes;
    job.env = run.env;
    job.secret_env = SecretEnv(run.secret_env);
    job.scheduled_at_ms = scheduled_at_ms;
    if !run.network.is_empty() {
        job.network_name = Some(run.network);
    }
    if !run.runtime.is_empty() {
        job.runtime_tag = Some(run.runtime);
    }

    match ctx.runner.submit(job) {
        Ok(job) => Response::JobStarted {
            uuid: job.uuid,
            status: job.status,
            scheduled_at_ms: job.scheduled_at_ms,
            started_at_ms: job.started_at_ms,
        },
        Err(e) => error_response(&e),
    }
}

pub(crate) fn handle_stop_job(ctx: &ListenCtx, uuid: &str) -> Response {
    match ctx.runner.stop(uuid) {
        Ok(status) => Response::JobStopped { status },
        Err(e) => error_response(&e),
    }
}

pub(crate) fn handle_delete_job(ctx: &ListenCtx, uuid: &str) -> Response {
    match ctx.manager.delete_job(uuid) {
        Ok(uuid) => Response::JobDeleted { success: true, message: format!("job {uuid} deleted") },
        Err(e) => error_response(&e),
    }
}

pub(crate) fn handle_delete_all_jobs(ctx: &ListenCtx) -> Response {
    let (deleted_count, skipped_count) = ctx.manager.delete_all_jobs();
    Response::JobsDeleted {
        deleted_count,
        skipped_count,
        message: format!("deleted {deleted_count} job(s), skipped {skipped_count} active"),
    }
}

pub(crate) fn handle_list_jobs(ctx: &ListenCtx) -> Response {
    let mut jobs: Vec<JobSummary> = ctx.manager.list().iter().map(JobSummary::from).collect();
    jobs.sort_by(|a, b| a.uuid.cmp(&b.uuid));
    Response::Jobs { jobs }
}

pub(crate) fn handle_job_status(ctx: &ListenCtx, uuid: &str) -> Response {
    match ctx.manager.get(uuid) {
        Ok(job) => Response::Job { job: Box::new(job) },
        Err(e) => error_response(&e),
    }
}
