// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle manager.
//!
//! Owns the task aggregates (job snapshot + in-memory log buffer), resolves
//! uuid prefixes, fans job events out through the bus, feeds the log
//! pipeline, and mirrors every mutation to the persistence daemon with
//! fire-and-forget writes.

use crate::buffer::LogBuffer;
use crate::bus::{EventBus, Subscription, TOPIC_JOBS};
use crate::error::EngineError;
use crate::persist::{fire_and_forget, PersistClient};
use crate::pipeline::LogPipeline;
use jl_core::{Clock, Event, Job, JobStatus, SystemClock, UUID_LEN};
use jl_store::JobStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default drain window after a terminal transition.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// When false, the in-memory buffer is skipped (output() is empty) to
    /// avoid unbounded growth without a persistence daemon to offload to.
    pub persistence_enabled: bool,
    /// How long subscribers keep draining after a terminal transition.
    pub drain_window: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { persistence_enabled: true, drain_window: DEFAULT_DRAIN_WINDOW }
    }
}

/// Per-job aggregate: snapshot, buffer, and attached stream ids.
struct JobTask {
    job: RwLock<Job>,
    buffer: Mutex<LogBuffer>,
    /// Bus subscription ids of streams attached to this job.
    streams: Mutex<Vec<u64>>,
}

impl JobTask {
    fn new(job: Job) -> Arc<Self> {
        Arc::new(Self {
            job: RwLock::new(job),
            buffer: Mutex::new(LogBuffer::new()),
            streams: Mutex::new(Vec::new()),
        })
    }
}

pub struct JobManager {
    store: Arc<JobStore>,
    tasks: RwLock<HashMap<String, Arc<JobTask>>>,
    bus: EventBus,
    pipeline: Arc<LogPipeline>,
    persist: Arc<dyn PersistClient>,
    config: ManagerConfig,
    closed: RwLock<bool>,
    sequence: AtomicU64,
    clock: SystemClock,
}

impl JobManager {
    pub fn new(
        store: Arc<JobStore>,
        bus: EventBus,
        pipeline: Arc<LogPipeline>,
        persist: Arc<dyn PersistClient>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            tasks: RwLock::new(HashMap::new()),
            bus,
            pipeline,
            persist,
            config,
            closed: RwLock::new(false),
            sequence: AtomicU64::new(0),
            clock: SystemClock,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn pipeline(&self) -> &LogPipeline {
        &self.pipeline
    }

    fn check_open(&self) -> Result<parking_lot::RwLockReadGuard<'_, bool>, EngineError> {
        let guard = self.closed.read();
        if *guard {
            return Err(EngineError::InvalidState("job manager is closed".to_string()));
        }
        Ok(guard)
    }

    /// Resolve a uuid or unique prefix to a full uuid.
    ///
    /// A 36-character input is taken as a full uuid unchanged, so
    /// resolution is idempotent. Prefixes scan the live task map.
    pub fn resolve(&self, uuid_or_prefix: &str) -> Result<String, EngineError> {
        if uuid_or_prefix.len() == UUID_LEN {
            return Ok(uuid_or_prefix.to_string());
        }
        let tasks = self.tasks.read();
        let mut matches: Vec<String> =
            tasks.keys().filter(|k| k.starts_with(uuid_or_prefix)).cloned().collect();
        match matches.len() {
            0 => Err(EngineError::not_found("job", uuid_or_prefix)),
            1 => Ok(matches.remove(0)),
            _ => {
                matches.sort();
                Err(EngineError::Ambiguous {
                    prefix: uuid_or_prefix.to_string(),
                    candidates: matches,
                })
            }
        }
    }

    /// Insert a new job, publish `job:created`, and persist asynchronously.
    pub fn create(&self, job: Job) -> Result<Job, EngineError> {
        let _open = self.check_open()?;
        self.store.create(job.clone()).map_err(|e| EngineError::store("create job", e))?;
        self.tasks.write().insert(job.uuid.clone(), JobTask::new(job.clone()));

        self.publish(Event::JobCreated { uuid: job.uuid.clone(), name: job.name.clone() });
        let persist = Arc::clone(&self.persist);
        let snapshot = job.clone();
        fire_and_forget("create_job", job.uuid.clone(), async move {
            persist.create_job(&snapshot).await
        });
        Ok(job)
    }

    /// Replace a job's record, publish `job:updated`, persist async.
    ///
    /// Subscribers are never torn down here, even on terminal transitions;
    /// the drain window lets in-flight chunks arrive first.
    pub fn update(&self, job: Job) -> Result<(), EngineError> {
        let _open = self.check_open()?;
        let task = self.task(&job.uuid)?;
        self.store.update(job.clone()).map_err(|e| EngineError::store("update job", e))?;
        *task.job.write() = job.clone();

        self.publish(Event::JobUpdated {
            uuid: job.uuid.clone(),
            status: job.status,
            exit_code: job.exit_code,
        });
        let persist = Arc::clone(&self.persist);
        let snapshot = job.clone();
        fire_and_forget("update_job", job.uuid, async move {
            persist.update_job(&snapshot).await
        });
        Ok(())
    }

    /// Apply a status transition through the job's state machine.
    pub fn transition(
        &self,
        uuid_or_prefix: &str,
        next: JobStatus,
        exit_code: Option<i32>,
    ) -> Result<Job, EngineError> {
        let uuid = self.resolve(uuid_or_prefix)?;
        let task = self.task(&uuid)?;
        let mut job = task.job.read().clone();
        if !job.transition(next, self.clock.epoch_ms()) {
            return Err(EngineError::InvalidState(format!(
                "job {uuid} cannot move from {} to {next}",
                job.status
            )));
        }
        if next.is_terminal() {
            job.exit_code = exit_code.or(job.exit_code);
        }
        self.update(job.clone())?;
        Ok(job)
    }

    /// Accept log bytes for a job: buffer (when persistence is enabled),
    /// publish `log:chunk`, and enqueue onto the pipeline. Never blocks.
    pub fn write_to_buffer(&self, uuid_or_prefix: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let _open = self.check_open()?;
        let uuid = self.resolve(uuid_or_prefix)?;
        let task = self.task(&uuid)?;

        if self.config.persistence_enabled {
            task.buffer.lock().append(bytes);
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.publish(Event::LogChunk { uuid: uuid.clone(), bytes: bytes.to_vec(), sequence });
        self.pipeline.write(&uuid, bytes);
        Ok(())
    }

    /// Concatenated buffer contents plus the current running flag.
    pub fn output(&self, uuid_or_prefix: &str) -> Result<(Vec<u8>, bool), EngineError> {
        let uuid = self.resolve(uuid_or_prefix)?;
        let task = self.task(&uuid)?;
        let bytes = task.buffer.lock().concatenated();
        let running = task.job.read().is_active();
        Ok((bytes, running))
    }

    /// Current snapshot of a job.
    pub fn get(&self, uuid_or_prefix: &str) -> Result<Job, EngineError> {
        let uuid = self.resolve(uuid_or_prefix)?;
        Ok(self.task(&uuid)?.job.read().clone())
    }

    /// Snapshots of every live job.
    pub fn list(&self) -> Vec<Job> {
        self.tasks.read().values().map(|t| t.job.read().clone()).collect()
    }

    /// Subscribe to the jobs topic (used by streaming handlers and the
    /// workflow executor).
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(TOPIC_JOBS)
    }

    /// Stream a job's output: history first, then live chunks until the
    /// job ends (plus the drain window), the sink closes, or `token` fires.
    pub async fn stream(
        &self,
        token: CancellationToken,
        uuid_or_prefix: &str,
        sink: mpsc::Sender<Vec<u8>>,
        skip_count: usize,
    ) -> Result<(), EngineError> {
        let uuid = self.resolve(uuid_or_prefix)?;
        let task = self.task(&uuid)?;

        let history = task.buffer.lock().chunks_from(skip_count);
        for chunk in history {
            if sink.send(chunk).await.is_err() {
                return Ok(());
            }
        }
        if task.job.read().is_terminal() {
            return Ok(());
        }

        let mut sub = self.subscribe();
        task.streams.lock().push(sub.id());
        let result = self.stream_live(&mut sub, &token, &uuid, &sink).await;
        task.streams.lock().retain(|id| *id != sub.id());
        self.bus.detach(TOPIC_JOBS, sub.id());
        result
    }

    async fn stream_live(
        &self,
        sub: &mut Subscription,
        token: &CancellationToken,
        uuid: &str,
        sink: &mpsc::Sender<Vec<u8>>,
    ) -> Result<(), EngineError> {
        let mut drain_deadline: Option<tokio::time::Instant> = None;

        loop {
            let event = match drain_deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, sub.recv()).await {
                    Ok(event) => event,
                    Err(_) => return Ok(()), // drain window elapsed
                },
                None => tokio::select! {
                    event = sub.recv() => event,
                    _ = token.cancelled() => return Ok(()),
                },
            };
            let Some(event) = event else {
                return Ok(());
            };

            match event {
                Event::LogChunk { uuid: event_uuid, bytes, .. } if event_uuid == uuid => {
                    if sink.send(bytes).await.is_err() {
                        return Ok(());
                    }
                }
                Event::JobUpdated { uuid: event_uuid, status, .. }
                    if event_uuid == uuid && status.is_terminal() =>
                {
                    // Switch to drain mode: trailing chunks already in
                    // flight still get delivered.
                    drain_deadline =
                        Some(tokio::time::Instant::now() + self.config.drain_window);
                }
                Event::JobDeleted { uuid: event_uuid } if event_uuid == uuid => {
                    return Ok(());
                }
                _ => {}
            }
            if token.is_cancelled() && drain_deadline.is_none() {
                return Ok(());
            }
        }
    }

    /// Delete a job. Refused while it is running or initializing; the
    /// persisted log files survive, only the live task is torn down.
    pub fn delete_job(&self, uuid_or_prefix: &str) -> Result<String, EngineError> {
        let _open = self.check_open()?;
        let uuid = self.resolve(uuid_or_prefix)?;
        let task = self.task(&uuid)?;
        {
            let job = task.job.read();
            if job.is_active() {
                return Err(EngineError::InvalidState(format!(
                    "cannot delete {} job {uuid}; stop it first",
                    job.status
                )));
            }
        }

        for stream_id in task.streams.lock().drain(..) {
            self.bus.detach(TOPIC_JOBS, stream_id);
        }
        self.tasks.write().remove(&uuid);
        self.store.delete(&uuid).map_err(|e| EngineError::store("delete job", e))?;

        let persist = Arc::clone(&self.persist);
        let persist_uuid = uuid.clone();
        fire_and_forget("delete_job", uuid.clone(), async move {
            persist.delete_job(&persist_uuid).await
        });
        self.publish(Event::JobDeleted { uuid: uuid.clone() });
        Ok(uuid)
    }

    /// Delete every deletable job; running/initializing jobs are skipped.
    pub fn delete_all_jobs(&self) -> (usize, usize) {
        let uuids: Vec<String> = self.tasks.read().keys().cloned().collect();
        let mut deleted = 0;
        let mut skipped = 0;
        for uuid in uuids {
            match self.delete_job(&uuid) {
                Ok(_) => deleted += 1,
                Err(EngineError::InvalidState(_)) => skipped += 1,
                Err(e) => {
                    tracing::warn!(job_uuid = %uuid, error = %e, "bulk delete failed");
                    skipped += 1;
                }
            }
        }
        (deleted, skipped)
    }

    /// Free the in-memory buffer and delete on-disk log files (local
    /// pipeline files and the persistence daemon's copies).
    pub fn delete_job_logs(&self, uuid_or_prefix: &str) -> Result<(), EngineError> {
        let _open = self.check_open()?;
        let uuid = self.resolve(uuid_or_prefix)?;
        let task = self.task(&uuid)?;

        for stream_id in task.streams.lock().drain(..) {
            self.bus.detach(TOPIC_JOBS, stream_id);
        }
        task.buffer.lock().clear();
        self.pipeline
            .delete_job_logs(&uuid)
            .map_err(|e| EngineError::Internal(format!("failed to delete job logs: {e}")))?;

        let persist = Arc::clone(&self.persist);
        let persist_uuid = uuid.clone();
        fire_and_forget("delete_job_logs", uuid, async move {
            persist.delete_job_logs(&persist_uuid).await
        });
        Ok(())
    }

    /// Rebuild the in-memory store from the persistence daemon at startup.
    pub async fn sync_from_persistent_state(&self) -> Result<usize, EngineError> {
        let jobs = self.persist.list_jobs().await?;
        let mut restored = 0;
        for job in jobs {
            match self.store.create(job.clone()) {
                Ok(()) => {
                    self.tasks.write().insert(job.uuid.clone(), JobTask::new(job));
                    restored += 1;
                }
                Err(jl_store::StoreError::AlreadyExists { .. }) => {}
                Err(e) => return Err(EngineError::store("sync job", e)),
            }
        }
        tracing::info!(restored, "synced jobs from persistent state");
        Ok(restored)
    }

    /// Close the manager: refuse new operations, close the bus, and flush
    /// the pipeline.
    pub async fn close(&self) {
        *self.closed.write() = true;
        self.bus.close();
        self.pipeline.close().await;
        self.store.close();
    }

    fn task(&self, uuid: &str) -> Result<Arc<JobTask>, EngineError> {
        self.tasks
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| EngineError::not_found("job", uuid))
    }

    fn publish(&self, event: Event) {
        if let Err(e) = self.bus.publish(TOPIC_JOBS, event) {
            tracing::debug!(error = %e, "event publish skipped");
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
