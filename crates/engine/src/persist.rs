// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client interface to the external persistence daemon.
//!
//! Durability writes are fire-and-forget with a short timeout; the daemon
//! re-reads its state via `list_jobs` on startup, so missed writes degrade
//! to memory-only operation rather than failing the caller.

use crate::error::EngineError;
use async_trait::async_trait;
use jl_core::Job;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
use std::sync::Arc;

/// One persisted log line returned by `query_logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp_ns: u64,
    pub content: Vec<u8>,
    /// "stdout" or "stderr"
    pub stream: String,
    pub sequence: u64,
}

/// Outbound IPC surface of the persistence daemon.
#[async_trait]
pub trait PersistClient: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<(), EngineError>;
    async fn update_job(&self, job: &Job) -> Result<(), EngineError>;
    async fn delete_job(&self, uuid: &str) -> Result<(), EngineError>;
    async fn delete_job_logs(&self, uuid: &str) -> Result<(), EngineError>;
    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError>;
    async fn query_logs(
        &self,
        uuid: &str,
        stream_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogRecord>, EngineError>;
    async fn ping(&self) -> Result<(), EngineError>;
}

/// Timeout applied to detached durability writes.
pub(crate) const FIRE_AND_FORGET_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn a detached durability write. Failures log a warning and are
/// otherwise dropped.
pub(crate) fn fire_and_forget<F>(operation: &'static str, uuid: String, fut: F)
where
    F: std::future::Future<Output = Result<(), EngineError>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(FIRE_AND_FORGET_TIMEOUT, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(job_uuid = %uuid, operation, error = %e, "durability write failed");
            }
            Err(_) => {
                tracing::warn!(job_uuid = %uuid, operation, "durability write timed out");
            }
        }
    });
}

/// In-memory persistence double for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakePersist {
    jobs: parking_lot::Mutex<std::collections::HashMap<String, Job>>,
    logs: parking_lot::Mutex<std::collections::HashMap<String, Vec<LogRecord>>>,
    deleted_logs: parking_lot::Mutex<Vec<String>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-support"))]
impl FakePersist {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: parking_lot::Mutex::new(std::collections::HashMap::new()),
            logs: parking_lot::Mutex::new(std::collections::HashMap::new()),
            deleted_logs: parking_lot::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Make every subsequent call fail with Unavailable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail.store(unavailable, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn seed_job(&self, job: Job) {
        self.jobs.lock().insert(job.uuid.clone(), job);
    }

    pub fn seed_logs(&self, uuid: &str, records: Vec<LogRecord>) {
        self.logs.lock().insert(uuid.to_string(), records);
    }

    pub fn stored_job(&self, uuid: &str) -> Option<Job> {
        self.jobs.lock().get(uuid).cloned()
    }

    pub fn log_deletions(&self) -> Vec<String> {
        self.deleted_logs.lock().clone()
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(EngineError::Unavailable("persist daemon", "fake outage".to_string()));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl PersistClient for FakePersist {
    async fn create_job(&self, job: &Job) -> Result<(), EngineError> {
        self.check()?;
        self.jobs.lock().insert(job.uuid.clone(), job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<(), EngineError> {
        self.check()?;
        self.jobs.lock().insert(job.uuid.clone(), job.clone());
        Ok(())
    }

    async fn delete_job(&self, uuid: &str) -> Result<(), EngineError> {
        self.check()?;
        self.jobs.lock().remove(uuid);
        Ok(())
    }

    async fn delete_job_logs(&self, uuid: &str) -> Result<(), EngineError> {
        self.check()?;
        self.logs.lock().remove(uuid);
        self.deleted_logs.lock().push(uuid.to_string());
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError> {
        self.check()?;
        Ok(self.jobs.lock().values().cloned().collect())
    }

    async fn query_logs(
        &self,
        uuid: &str,
        stream_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogRecord>, EngineError> {
        self.check()?;
        let logs = self.logs.lock();
        let records = logs.get(uuid).cloned().unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| stream_filter.map_or(true, |s| r.stream == s))
            .skip(offset)
            .take(if limit == 0 { usize::MAX } else { limit })
            .collect())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        self.check()
    }
}
