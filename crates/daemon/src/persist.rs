// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC client for the persistence daemon.
//!
//! Same length-prefixed JSON framing as the public protocol, over the
//! persistence daemon's Unix socket. An unreachable daemon at startup is
//! fatal after the bounded retry; once operating, failures degrade to
//! memory-only mode with a warning.

use async_trait::async_trait;
use jl_core::Job;
use jl_engine::{EngineError, LogRecord, PersistClient};
use jl_wire::{read_message, write_message};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::Semaphore;

/// Startup health check: attempts × delay, each with its own deadline.
pub const HEALTH_ATTEMPTS: u32 = 30;
pub const HEALTH_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const HEALTH_PING_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum PersistRequest {
    Ping,
    CreateJob { job: Box<Job> },
    UpdateJob { job: Box<Job> },
    DeleteJob { uuid: String },
    DeleteJobLogs { uuid: String },
    ListJobs,
    QueryLogs {
        uuid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_filter: Option<String>,
        #[serde(default)]
        limit: usize,
        #[serde(default)]
        offset: usize,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum PersistResponse {
    Ok,
    Pong,
    Jobs { jobs: Vec<Job> },
    Logs { records: Vec<LogRecord> },
    Error { message: String },
}

/// Unix-socket client with a bounded connection pool.
pub struct UnixPersistClient {
    socket_path: PathBuf,
    timeout: Duration,
    pool: Semaphore,
}

impl UnixPersistClient {
    pub fn new(socket_path: PathBuf, timeout: Duration, pool_size: usize) -> Self {
        Self { socket_path, timeout, pool: Semaphore::new(pool_size.max(1)) }
    }

    /// Ping with bounded retry. Used at startup; failure is fatal there.
    pub async fn wait_ready(&self) -> Result<(), EngineError> {
        for attempt in 1..=HEALTH_ATTEMPTS {
            match tokio::time::timeout(HEALTH_PING_DEADLINE, self.ping()).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    tracing::debug!(attempt, error = %e, "persist daemon ping failed");
                }
                Err(_) => {
                    tracing::debug!(attempt, "persist daemon ping deadline exceeded");
                }
            }
            if attempt < HEALTH_ATTEMPTS {
                tokio::time::sleep(HEALTH_RETRY_DELAY).await;
            }
        }
        Err(EngineError::Unavailable(
            "persist daemon",
            format!("no response after {HEALTH_ATTEMPTS} attempts"),
        ))
    }

    async fn call(&self, request: PersistRequest) -> Result<PersistResponse, EngineError> {
        let _slot = self
            .pool
            .acquire()
            .await
            .map_err(|_| EngineError::Unavailable("persist daemon", "pool closed".to_string()))?;

        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| EngineError::Unavailable("persist daemon", e.to_string()))?;
        write_message(&mut stream, &request, self.timeout)
            .await
            .map_err(|e| EngineError::Unavailable("persist daemon", e.to_string()))?;
        let response: PersistResponse = read_message(&mut stream, self.timeout)
            .await
            .map_err(|e| EngineError::Unavailable("persist daemon", e.to_string()))?;
        match response {
            PersistResponse::Error { message } => Err(EngineError::Internal(message)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl PersistClient for UnixPersistClient {
    async fn create_job(&self, job: &Job) -> Result<(), EngineError> {
        self.call(PersistRequest::CreateJob { job: Box::new(job.clone()) }).await.map(|_| ())
    }

    async fn update_job(&self, job: &Job) -> Result<(), EngineError> {
        self.call(PersistRequest::UpdateJob { job: Box::new(job.clone()) }).await.map(|_| ())
    }

    async fn delete_job(&self, uuid: &str) -> Result<(), EngineError> {
        self.call(PersistRequest::DeleteJob { uuid: uuid.to_string() }).await.map(|_| ())
    }

    async fn delete_job_logs(&self, uuid: &str) -> Result<(), EngineError> {
        self.call(PersistRequest::DeleteJobLogs { uuid: uuid.to_string() }).await.map(|_| ())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError> {
        match self.call(PersistRequest::ListJobs).await? {
            PersistResponse::Jobs { jobs } => Ok(jobs),
            _ => Err(EngineError::Internal("unexpected persist response".to_string())),
        }
    }

    async fn query_logs(
        &self,
        uuid: &str,
        stream_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogRecord>, EngineError> {
        let request = PersistRequest::QueryLogs {
            uuid: uuid.to_string(),
            stream_filter: stream_filter.map(str::to_string),
            limit,
            offset,
        };
        match self.call(request).await? {
            PersistResponse::Logs { records } => Ok(records),
            _ => Err(EngineError::Internal("unexpected persist response".to_string())),
        }
    }

    async fn ping(&self) -> Result<(), EngineError> {
        self.call(PersistRequest::Ping).await.map(|_| ())
    }
}

/// Memory-only stand-in used when the persistence daemon is absent.
///
/// Writes succeed and vanish; reads come back empty. Keeps the rest of
/// the daemon oblivious to degraded mode.
pub struct NullPersist;

#[async_trait]
impl PersistClient for NullPersist {
    async fn create_job(&self, _job: &Job) -> Result<(), EngineError> {
        Ok(())
    }

    async fn update_job(&self, _job: &Job) -> Result<(), EngineError> {
        Ok(())
    }

    async fn delete_job(&self, _uuid: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn delete_job_logs(&self, _uuid: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError> {
        Ok(Vec::new())
    }

    async fn query_logs(
        &self,
        _uuid: &str,
        _stream_filter: Option<&str>,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<LogRecord>, EngineError> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Pick the persistence client for this run: a live daemon when its
/// socket answers, otherwise memory-only degraded mode.
pub async fn select_client(
    socket_path: PathBuf,
    timeout: Duration,
    pool_size: usize,
    require: bool,
) -> Result<Arc<dyn PersistClient>, EngineError> {
    let client = UnixPersistClient::new(socket_path.clone(), timeout, pool_size);
    if socket_path.exists() {
        client.wait_ready().await?;
        tracing::info!(socket = %socket_path.display(), "persistence daemon connected");
        return Ok(Arc::new(client));
    }
    if require {
        return Err(EngineError::Unavailable(
            "persist daemon",
            format!("socket {} not found", socket_path.display()),
        ));
    }
    tracing::warn!(
        socket = %socket_path.display(),
        "persistence daemon unavailable; running memory-only"
    );
    Ok(Arc::new(NullPersist))
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
