// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming response handlers.
//!
//! Each handler writes a sequence of frames ending with `StreamEnd`.
//! A task watches the reader for EOF so a vanished client cancels the
//! stream instead of leaking it.

use super::{error_response, ListenCtx};
use crate::env::ipc_timeout;
use jl_core::Event;
use jl_wire::{write_message, ProtocolError, Response};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Cancel `token` once the client's read side reaches EOF or errors.
fn watch_disconnect<R>(mut reader: R, token: CancellationToken) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 1];
        // Clients send nothing after the request; any read completion
        // means the connection is gone or misused.
        let _ = reader.read(&mut buf).await;
        token.cancel();
    })
}

pub(crate) async fn handle_job_logs<R, W>(
    ctx: &ListenCtx,
    uuid: &str,
    skip_count: usize,
    reader: R,
    mut writer: W,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let token = CancellationToken::new();
    let watcher = watch_disconnect(reader, token.clone());

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(256);
    let manager = std::sync::Arc::clone(&ctx.manager);
    let stream_uuid = uuid.to_string();
    let stream_token = token.clone();
    let stream_task = tokio::spawn(async move {
        manager.stream(stream_token, &stream_uuid, tx, skip_count).await
    });

    let mut write_failed = false;
    while let Some(bytes) = rx.recv().await {
        if write_message(&mut writer, &Response::LogChunk { bytes }, ipc_timeout())
            .await
            .is_err()
        {
            token.cancel();
            write_failed = true;
            break;
        }
    }

    let result = stream_task.await;
    watcher.abort();
    if write_failed {
        return Ok(());
    }
    match result {
        Ok(Ok(())) => write_message(&mut writer, &Response::StreamEnd, ipc_timeout()).await,
        Ok(Err(e)) => write_message(&mut writer, &error_response(&e), ipc_timeout()).await,
        Err(e) => {
            tracing::error!(error = %e, "log stream task panicked");
            write_message(
                &mut writer,
                &Response::error(jl_wire::ErrorCode::Internal, "stream failed"),
                ipc_timeout(),
            )
            .await
        }
    }
}

pub(crate) async fn handle_job_metrics<R, W>(
    ctx: &ListenCtx,
    uuid_or_prefix: &str,
    reader: R,
    mut writer: W,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let job = match ctx.manager.get(uuid_or_prefix) {
        Ok(job) => job,
        Err(e) => {
            return write_message(&mut writer, &error_response(&e), ipc_timeout()).await;
        }
    };

    let token = CancellationToken::new();
    let watcher = watch_disconnect(reader, token.clone());

    // History first, then live samples until the job ends.
    for sample in ctx.metrics_sink.history(&job.uuid, 0) {
        write_message(
            &mut writer,
            &Response::MetricsSample { sample: Box::new(sample) },
            ipc_timeout(),
        )
        .await?;
    }

    if !job.is_terminal() {
        let mut sub = ctx.manager.subscribe();
        loop {
            let event = tokio::select! {
                event = sub.recv() => event,
                _ = token.cancelled() => break,
            };
            let Some(event) = event else { break };
            match event {
                Event::MetricsSample { uuid, sample } if uuid == job.uuid => {
                    if write_message(
                        &mut writer,
                        &Response::MetricsSample { sample },
                        ipc_timeout(),
                    )
                    .await
                    .is_err()
                    {
                        break;
                    }
                }
                Event::JobUpdated { uuid, status, .. }
                    if uuid == job.uuid && status.is_terminal() =>
                {
                    break;
                }
                Event::JobDeleted { uuid } if uuid == job.uuid => break,
                _ => {}
            }
        }
        sub.cancel();
    }

    watcher.abort();
    let _ = write_message(&mut writer, &Response::StreamEnd, ipc_timeout()).await;
    Ok(())
}

pub(crate) async fn handle_system_metrics<R, W>(
    ctx: &ListenCtx,
    interval_seconds: u64,
    metric_types: Vec<String>,
    reader: R,
    mut writer: W,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let token = CancellationToken::new();
    let watcher = watch_disconnect(reader, token.clone());
    let interval = Duration::from_secs(interval_seconds.max(1));

    loop {
        let mut status = ctx.sampler.lock().sample();
        filter_metric_types(&mut status, &metric_types);
        if write_message(
            &mut writer,
            &Response::SystemStatus { status: Box::new(status) },
            ipc_timeout(),
        )
        .await
        .is_err()
        {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = token.cancelled() => break,
        }
    }
    watcher.abort();
    Ok(())
}

/// Keep only the requested sections; an empty list means everything.
fn filter_metric_types(status: &mut jl_wire::SystemStatus, metric_types: &[String]) {
    if metric_types.is_empty() {
        return;
    }
    let wanted = |name: &str| metric_types.iter().any(|t| t == name);
    if !wanted("cpu") {
        status.cpu = Default::default();
    }
    if !wanted("memory") {
        status.memory = Default::default();
    }
    if !wanted("disks") {
        status.disks.clear();
    }
    if !wanted("networks") {
        status.networks.clear();
    }
    if !wanted("processes") {
        status.top_by_cpu.clear();
        status.top_by_memory.clear();
    }
}
