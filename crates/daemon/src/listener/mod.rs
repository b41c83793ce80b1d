// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections without blocking the rest of the daemon, reads one
//! request per connection, and answers with a single response or a frame
//! stream. Client disconnects cancel in-flight streams.

mod jobs;
mod resources;
mod streams;
mod workflows;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::env::{ipc_timeout, SERVER_VERSION};
use crate::system::SystemSampler;
use jl_engine::{
    EngineError, JobManager, JobRunner, MetricsSink, WorkflowExecutor,
};
use jl_store::{NetworkStore, VolumeStore};
use jl_wire::{read_message, write_message, ErrorCode, ProtocolError, Request, Response};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tracing::{debug, error, info};

/// Shared daemon context for all request handlers.
pub(crate) struct ListenCtx {
    pub runner: Arc<JobRunner>,
    pub manager: Arc<JobManager>,
    pub executor: Arc<WorkflowExecutor>,
    pub volumes: Arc<VolumeStore>,
    pub networks: Arc<NetworkStore>,
    pub metrics_sink: Arc<MetricsSink>,
    pub sampler: Mutex<SystemSampler>,
    pub volumes_root: PathBuf,
    pub start_time: Instant,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub(crate) fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the accept loop until the daemon shuts down, spawning a task
    /// per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => debug!("connection timed out"),
        other => error!("connection error: {}", other),
    }
}

/// Handle a single client connection.
///
/// Generic over reader/writer so tests can drive it over an in-memory
/// duplex instead of a real socket.
pub(crate) async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let request: Request = read_message(&mut reader, ipc_timeout()).await?;
    debug!(request = ?request, "received request");

    // Streaming requests hold the connection open and write frames until
    // the stream ends or the client goes away.
    match request {
        Request::GetJobLogs { uuid, skip_count } => {
            return streams::handle_job_logs(ctx, &uuid, skip_count, reader, writer).await;
        }
        Request::GetJobMetrics { uuid } => {
            return streams::handle_job_metrics(ctx, &uuid, reader, writer).await;
        }
        Request::StreamSystemMetrics { interval_seconds, metric_types } => {
            return streams::handle_system_metrics(
                ctx,
                interval_seconds,
                metric_types,
                reader,
                writer,
            )
            .await;
        }
        other => {
            let response = handle_request(other, ctx).await;
            write_message(&mut writer, &response, ipc_timeout()).await
        }
    }
}

/// Dispatch a unary request. Never returns a protocol error — failures
/// become `Response::Error`.
async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Hello { version } => {
            debug!(client_version = %version, "hello");
            Response::Hello { version: SERVER_VERSION.to_string() }
        }
        Request::Status => {
            let jobs_active = ctx.manager.list().iter().filter(|j| !j.is_terminal()).count();
            Response::Status {
                uptime_secs: ctx.start_time.elapsed().as_secs(),
                jobs_active,
                version: SERVER_VERSION.to_string(),
            }
        }
        Request::GetSystemStatus => {
            let status = ctx.sampler.lock().sample();
            Response::SystemStatus { status: Box::new(status) }
        }

        Request::RunJob(run) => jobs::handle_run_job(ctx, run),
        Request::StopJob { uuid } => jobs::handle_stop_job(ctx, &uuid),
        Request::DeleteJob { uuid } => jobs::handle_delete_job(ctx, &uuid),
        Request::DeleteAllJobs => jobs::handle_delete_all_jobs(ctx),
        Request::ListJobs => jobs::handle_list_jobs(ctx),
        Request::GetJobStatus { uuid } => jobs::handle_job_status(ctx, &uuid),

        Request::RunWorkflow(run) => workflows::handle_run_workflow(ctx, run),
        Request::ListWorkflows { include_completed } => {
            workflows::handle_list_workflows(ctx, include_completed)
        }
        Request::GetWorkflowStatus { uuid } => workflows::handle_workflow_status(ctx, &uuid),

        Request::CreateVolume { name, volume_type, size_bytes } => {
            resources::handle_create_volume(ctx, &name, &volume_type, size_bytes)
        }
        Request::ListVolumes => resources::handle_list_volumes(ctx),
        Request::RemoveVolume { name } => resources::handle_remove_volume(ctx, &name),
        Request::CreateNetwork { name, cidr } => {
            resources::handle_create_network(ctx, &name, &cidr)
        }
        Request::ListNetworks => resources::handle_list_networks(ctx),
        Request::RemoveNetwork { name } => resources::handle_remove_network(ctx, &name),

        // Streaming variants are intercepted in handle_connection.
        Request::GetJobLogs { .. }
        | Request::GetJobMetrics { .. }
        | Request::StreamSystemMetrics { .. } => {
            Response::error(ErrorCode::Internal, "stream request on unary path")
        }
    }
}

/// Map an engine error onto the wire's status-code vocabulary.
pub(crate) fn error_response(e: &EngineError) -> Response {
    let code = match e {
        EngineError::NotFound { .. } => ErrorCode::NotFound,
        EngineError::Ambiguous { .. } | EngineError::ValidationFailed(_) => {
            ErrorCode::InvalidArgument
        }
        EngineError::Conflict(_) | EngineError::InvalidState(_) => ErrorCode::FailedPrecondition,
        EngineError::Unavailable(_, _) => ErrorCode::Unavailable,
        EngineError::Cancelled => ErrorCode::Canceled,
        EngineError::Store { .. } | EngineError::Internal(_) => ErrorCode::Internal,
    };
    if code == ErrorCode::Internal {
        error!(error = %e, "internal error");
    }
    Response::error(code, e.to_string())
}

pub(crate) fn info_ready(socket: &std::path::Path) {
    info!(socket = %socket.display(), "listener ready");
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
