// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives a job through its sandbox: dispatch, stdio capture, metrics,
//! terminal transition, and cleanup.

use crate::collector::MetricsCollector;
use crate::error::EngineError;
use crate::manager::JobManager;
use crate::scheduler::Scheduler;
use jl_core::{Clock, Job, JobStatus, SystemClock};
use jl_sandbox::{Sandbox, SandboxDriver, SandboxSpec, StdioReader};
use jl_store::{NetworkStore, VolumeStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Grace period between SIGTERM and SIGKILL on stop.
const STOP_GRACE: Duration = Duration::from_secs(5);

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// Launches jobs into sandboxes and supervises them to completion.
pub struct JobRunner {
    manager: Arc<JobManager>,
    driver: Arc<dyn SandboxDriver>,
    collector: Arc<MetricsCollector>,
    networks: Arc<NetworkStore>,
    volumes: Arc<VolumeStore>,
    scheduler: Arc<Scheduler>,
    workdir_root: PathBuf,
    sample_interval: Duration,
    metrics_enabled: bool,
    active: Mutex<HashMap<String, CancellationToken>>,
    clock: SystemClock,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manager: Arc<JobManager>,
        driver: Arc<dyn SandboxDriver>,
        collector: Arc<MetricsCollector>,
        networks: Arc<NetworkStore>,
        volumes: Arc<VolumeStore>,
        scheduler: Arc<Scheduler>,
        workdir_root: PathBuf,
        sample_interval: Duration,
        metrics_enabled: bool,
    ) -> Self {
        Self {
            manager,
            driver,
            collector,
            networks,
            volumes,
            scheduler,
            workdir_root,
            sample_interval,
            metrics_enabled,
            active: Mutex::new(HashMap::new()),
            clock: SystemClock,
        }
    }

    pub fn manager(&self) -> &Arc<JobManager> {
        &self.manager
    }

    /// Register a job and either launch it now or defer it to the
    /// scheduler when its start time lies in the future.
    pub fn submit(self: &Arc<Self>, job: Job) -> Result<Job, EngineError> {
        let job = self.manager.create(job)?;
        match job.scheduled_at_ms {
            Some(due) if due > self.clock.epoch_ms() => {
                self.manager.transition(&job.uuid, JobStatus::Scheduled, None)?;
                self.scheduler.schedule(&job.uuid, due);
            }
            _ => self.launch(&job.uuid)?,
        }
        self.manager.get(&job.uuid)
    }

    /// Dispatch a stored job into its sandbox. Returns once the job is
    /// initializing; a supervisor task follows it to a terminal state.
    pub fn launch(self: &Arc<Self>, uuid_or_prefix: &str) -> Result<(), EngineError> {
        let uuid = self.manager.resolve(uuid_or_prefix)?;
        let job = self.manager.transition(&uuid, JobStatus::Initializing, None)?;

        let stop_token = CancellationToken::new();
        self.active.lock().insert(uuid.clone(), stop_token.clone());

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = runner.supervise(&job, stop_token).await;
            let (status, exit_code) = match outcome {
                Ok((status, code)) => (status, code),
                Err(e) => {
                    tracing::error!(job_uuid = %job.uuid, error = %e, "job launch failed");
                    runner.manager.write_to_buffer(&job.uuid, format!("{e}\n").as_bytes()).ok();
                    (JobStatus::Failed, None)
                }
            };
            if let Err(e) = runner.manager.transition(&job.uuid, status, exit_code) {
                tracing::warn!(job_uuid = %job.uuid, error = %e, "terminal transition rejected");
            }
            runner.active.lock().remove(&job.uuid);
        });
        Ok(())
    }

    /// Stop a job: signal running sandboxes, cancel scheduled entries.
    ///
    /// Returns the status the job is headed for — STOPPED for jobs that
    /// ran, CANCELED for jobs that never did.
    pub fn stop(&self, uuid_or_prefix: &str) -> Result<JobStatus, EngineError> {
        let uuid = self.manager.resolve(uuid_or_prefix)?;
        let job = self.manager.get(&uuid)?;
        match job.status {
            JobStatus::Scheduled => {
                self.scheduler.cancel(&uuid);
                self.manager.transition(&uuid, JobStatus::Canceled, None)?;
                Ok(JobStatus::Canceled)
            }
            JobStatus::Pending => {
                self.manager.transition(&uuid, JobStatus::Canceled, None)?;
                Ok(JobStatus::Canceled)
            }
            JobStatus::Initializing | JobStatus::Running => {
                if let Some(token) = self.active.lock().get(&uuid) {
                    token.cancel();
                }
                Ok(JobStatus::Stopped)
            }
            terminal => Err(EngineError::InvalidState(format!("job {uuid} is already {terminal}"))),
        }
    }

    /// Drain the scheduler's dispatch channel, launching each due job.
    pub async fn serve_scheduled(self: Arc<Self>, mut due: tokio::sync::mpsc::Receiver<String>) {
        while let Some(uuid) = due.recv().await {
            if let Err(e) = self.launch(&uuid) {
                tracing::warn!(job_uuid = %uuid, error = %e, "scheduled launch failed");
            }
        }
    }

    async fn supervise(
        &self,
        job: &Job,
        stop_token: CancellationToken,
    ) -> Result<(JobStatus, Option<i32>), EngineError> {
        let allocation = match &job.network_name {
            Some(network) => Some(
                self.networks
                    .attach(&job.uuid, network, &job.name, self.clock.epoch_ms())
                    .map_err(|e| EngineError::store("attach network", e))?,
            ),
            None => None,
        };
        for volume in &job.volumes {
            if let Err(e) = self.volumes.increment_ref(volume) {
                tracing::warn!(job_uuid = %job.uuid, volume = %volume, error = %e, "volume ref failed");
            }
        }

        let spec = SandboxSpec {
            job_uuid: job.uuid.clone(),
            command: job.command.clone(),
            args: job.args.clone(),
            env: job.env.clone(),
            secret_env: job.secret_env.clone(),
            limits: job.limits.clone(),
            workdir: self.workdir_root.join(&job.uuid),
            uploads: job.uploads.clone(),
            volumes: job.volumes.clone(),
            runtime: job.runtime_tag.clone(),
            ip_address: allocation.as_ref().map(|a| a.ip_address.clone()).unwrap_or_default(),
            hostname: allocation.as_ref().map(|a| a.hostname.clone()).unwrap_or_default(),
        };

        let result = self.run_sandbox(job, spec, stop_token).await;

        // Cleanup is best-effort and must run on every path.
        if allocation.is_some() {
            if let Err(e) = self.networks.detach(&job.uuid) {
                tracing::warn!(job_uuid = %job.uuid, error = %e, "network detach failed");
            }
        }
        for volume in &job.volumes {
            if let Err(e) = self.volumes.decrement_ref(volume) {
                tracing::warn!(job_uuid = %job.uuid, volume = %volume, error = %e, "volume unref failed");
            }
        }
        result
    }

    async fn run_sandbox(
        &self,
        job: &Job,
        spec: SandboxSpec,
        stop_token: CancellationToken,
    ) -> Result<(JobStatus, Option<i32>), EngineError> {
        let mut sandbox = self
            .driver
            .prepare(spec)
            .await
            .map_err(|e| EngineError::Internal(format!("sandbox prepare: {e}")))?;

        let (_pid, reader) = sandbox
            .start()
            .await
            .map_err(|e| EngineError::Internal(format!("sandbox start: {e}")))?;
        self.manager.transition(&job.uuid, JobStatus::Running, None)?;

        let (stdout, stderr) = sandbox
            .attach_stdio()
            .map_err(|e| EngineError::Internal(format!("stdio attach: {e}")))?;
        let out_task = spawn_reader(Arc::clone(&self.manager), job.uuid.clone(), stdout);
        let err_task = spawn_reader(Arc::clone(&self.manager), job.uuid.clone(), stderr);

        if self.metrics_enabled {
            if let Err(e) = self.collector.start(
                &job.uuid,
                reader,
                self.sample_interval,
                &job.limits,
                job.limits.gpu_indices.clone(),
            ) {
                tracing::warn!(job_uuid = %job.uuid, error = %e, "metrics collector not started");
            }
        }

        let waited = tokio::select! {
            code = sandbox.wait() => Some(code),
            _ = stop_token.cancelled() => None,
        };
        let (status, exit_code) = match waited {
            Some(code) => {
                let code = code.map_err(|e| EngineError::Internal(format!("wait: {e}")))?;
                let status = if code == 0 { JobStatus::Completed } else { JobStatus::Failed };
                (status, Some(code))
            }
            None => {
                let code = self.stop_sandbox(&job.uuid, sandbox.as_mut()).await;
                (JobStatus::Stopped, code)
            }
        };

        // Let the reader tasks deliver trailing output before teardown.
        let _ = out_task.await;
        let _ = err_task.await;
        if self.metrics_enabled {
            // Collector may have failed to start; nothing to stop then.
            let _ = self.collector.stop(&job.uuid);
        }
        if let Err(e) = sandbox.teardown().await {
            tracing::warn!(job_uuid = %job.uuid, error = %e, "sandbox teardown failed");
        }
        Ok((status, exit_code))
    }

    /// SIGTERM, grace period, then SIGKILL.
    async fn stop_sandbox(&self, job_uuid: &str, sandbox: &mut dyn Sandbox) -> Option<i32> {
        if let Err(e) = sandbox.signal(SIGTERM) {
            tracing::warn!(job_uuid, error = %e, "SIGTERM failed");
        }
        match tokio::time::timeout(STOP_GRACE, sandbox.wait()).await {
            Ok(Ok(code)) => Some(code),
            Ok(Err(e)) => {
                tracing::warn!(job_uuid, error = %e, "wait after SIGTERM failed");
                None
            }
            Err(_) => {
                tracing::warn!(job_uuid, "grace period elapsed; sending SIGKILL");
                if let Err(e) = sandbox.signal(SIGKILL) {
                    tracing::warn!(job_uuid, error = %e, "SIGKILL failed");
                }
                match sandbox.wait().await {
                    Ok(code) => Some(code),
                    Err(_) => None,
                }
            }
        }
    }
}

/// Read one stdio stream to EOF, forwarding chunks into the buffer path.
fn spawn_reader(
    manager: Arc<JobManager>,
    job_uuid: String,
    mut stream: StdioReader,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = manager.write_to_buffer(&job_uuid, &buf[..n]) {
                        tracing::warn!(job_uuid = %job_uuid, error = %e, "buffer write failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(job_uuid = %job_uuid, error = %e, "stdio read ended");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
