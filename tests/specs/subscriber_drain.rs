// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drain window: trailing chunks published after the terminal transition
//! still reach subscribers.

use super::harness::{stack, wait_for, SPEC_WAIT};
use jl_core::{Job, JobStatus};
use jl_engine::EngineError;
use jl_sandbox::FakeScript;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn trailing_chunk_delivered_inside_drain_window() {
    let s = stack(FakeScript::default());
    let job = s.manager.create(Job::builder().name("drain").build()).unwrap();
    s.manager.transition(&job.uuid, JobStatus::Initializing, None).unwrap();
    s.manager.transition(&job.uuid, JobStatus::Running, None).unwrap();

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
    let manager = Arc::clone(&s.manager);
    let uuid = job.uuid.clone();
    let stream = tokio::spawn(async move {
        manager.stream(CancellationToken::new(), &uuid, tx, 0).await
    });
    // Give the stream a moment to subscribe before the burst.
    tokio::time::sleep(Duration::from_millis(30)).await;

    // "A", terminal transition, then "B" — all within the drain window.
    s.manager.write_to_buffer(&job.uuid, b"A").unwrap();
    s.manager.transition(&job.uuid, JobStatus::Completed, Some(0)).unwrap();
    s.manager.write_to_buffer(&job.uuid, b"B").unwrap();

    assert_eq!(rx.recv().await.unwrap(), b"A");
    assert_eq!(rx.recv().await.unwrap(), b"B");

    // The stream closes once the window elapses.
    assert!(rx.recv().await.is_none());
    stream.await.unwrap().unwrap();
}

#[tokio::test]
async fn single_producer_order_reaches_subscriber_unchanged() {
    let s = stack(FakeScript::default());
    let job = s.manager.create(Job::builder().name("order").build()).unwrap();
    s.manager.transition(&job.uuid, JobStatus::Initializing, None).unwrap();
    s.manager.transition(&job.uuid, JobStatus::Running, None).unwrap();

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(256);
    let manager = Arc::clone(&s.manager);
    let uuid = job.uuid.clone();
    let stream = tokio::spawn(async move {
        manager.stream(CancellationToken::new(), &uuid, tx, 0).await
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut expected = Vec::new();
    for i in 0..50 {
        let piece = format!("{i};");
        expected.extend_from_slice(piece.as_bytes());
        s.manager.write_to_buffer(&job.uuid, piece.as_bytes()).unwrap();
    }
    s.manager.transition(&job.uuid, JobStatus::Completed, Some(0)).unwrap();

    let mut received = Vec::new();
    while let Some(chunk) = rx.recv().await {
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, expected);
    stream.await.unwrap().unwrap();

    // The buffer agrees with what the subscriber saw.
    let (buffered, running) = s.manager.output(&job.uuid).unwrap();
    assert_eq!(buffered, expected);
    assert!(!running);
}

#[tokio::test]
async fn job_survives_terminal_transition_and_logs_remain() {
    let s = stack(FakeScript::succeeding("output\n"));
    let job = s.runner.submit(Job::builder().name("keeper").build()).unwrap();

    assert!(
        wait_for(SPEC_WAIT, || s.manager.get(&job.uuid).map(|j| j.is_terminal()).unwrap_or(false))
            .await
    );

    // Terminal transition never tears the job down implicitly.
    let (bytes, _) = s.manager.output(&job.uuid).unwrap();
    assert_eq!(bytes, b"output\n");

    // Only explicit deletion removes it.
    s.manager.delete_job(&job.uuid).unwrap();
    assert!(matches!(s.manager.get(&job.uuid), Err(EngineError::NotFound { .. })));
}
