// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jl_core::JobStatus;
use tokio::net::UnixListener;

const TIMEOUT: Duration = Duration::from_secs(1);

/// Minimal in-process persistence daemon for client tests.
async fn serve_one(listener: UnixListener, response: PersistResponse) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let _request: PersistRequest = read_message(&mut stream, TIMEOUT).await.unwrap();
    write_message(&mut stream, &response, TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn ping_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("persist.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    tokio::spawn(serve_one(listener, PersistResponse::Pong));

    let client = UnixPersistClient::new(socket, TIMEOUT, 4);
    client.ping().await.unwrap();
}

#[tokio::test]
async fn list_jobs_decodes_records() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("persist.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let job = jl_core::Job::builder().name("restored").status(JobStatus::Completed).build();
    tokio::spawn(serve_one(listener, PersistResponse::Jobs { jobs: vec![job.clone()] }));

    let client = UnixPersistClient::new(socket, TIMEOUT, 4);
    let jobs = client.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].uuid, job.uuid);
}

#[tokio::test]
async fn daemon_error_surfaces_as_internal() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("persist.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    tokio::spawn(serve_one(listener, PersistResponse::Error { message: "disk full".into() }));

    let client = UnixPersistClient::new(socket, TIMEOUT, 4);
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, EngineError::Internal(_)));
    assert!(err.to_string().contains("disk full"));
}

#[tokio::test]
async fn missing_socket_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let client = UnixPersistClient::new(dir.path().join("ghost.sock"), TIMEOUT, 4);
    assert!(matches!(
        client.ping().await,
        Err(EngineError::Unavailable("persist daemon", _))
    ));
}

#[tokio::test]
async fn select_client_degrades_without_socket() {
    let dir = tempfile::tempdir().unwrap();
    let client = select_client(dir.path().join("ghost.sock"), TIMEOUT, 4, false)
        .await
        .unwrap();
    // Memory-only mode: writes succeed, reads come back empty.
    client.ping().await.unwrap();
    assert!(client.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn select_client_required_fails_without_socket() {
    let dir = tempfile::tempdir().unwrap();
    let result = select_client(dir.path().join("ghost.sock"), TIMEOUT, 4, true).await;
    assert!(matches!(result, Err(EngineError::Unavailable(_, _))));
}
