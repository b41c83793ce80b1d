// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup wiring, PID lock, shutdown.

use crate::config::{Config, ConfigError};
use crate::env;
use crate::listener::{ListenCtx, Listener};
use crate::persist::select_client;
use crate::system::SystemSampler;
use fs2::FileExt;
use jl_engine::{
    EngineError, EventBus, JobManager, JobRunner, ManagerConfig, MetricsCollector, MetricsSink,
    MetricsSinkConfig, PipelineConfig, Scheduler, StoreCatalog, WorkflowExecutor,
};
use jl_sandbox::ProcessDriver;
use jl_store::{JobStore, NetworkStore, VolumeStore};
use jl_engine::LogPipeline;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine state directory (set JL_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("another daemon already holds {0}")]
    AlreadyRunning(PathBuf),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem layout under the state directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub daemon_log_path: PathBuf,
    pub persist_socket_path: PathBuf,
    pub volumes_path: PathBuf,
    pub workdir_path: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self, LifecycleError> {
        Ok(Self::under(env::state_dir()?))
    }

    pub fn under(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("joblet.sock"),
            lock_path: state_dir.join("jld.pid"),
            daemon_log_path: state_dir.join("jld.log"),
            persist_socket_path: state_dir.join("persist.sock"),
            volumes_path: state_dir.join("volumes"),
            workdir_path: state_dir.join("work"),
            state_dir,
        }
    }
}

/// Running daemon components, kept for shutdown.
pub struct DaemonState {
    pub paths: Paths,
    pub manager: Arc<JobManager>,
    pub runner: Arc<JobRunner>,
    pub executor: Arc<WorkflowExecutor>,
    pub collector: Arc<MetricsCollector>,
    pub scheduler: Arc<Scheduler>,
    pub metrics_sink: Arc<MetricsSink>,
    // NOTE(lifetime): held to maintain the exclusive PID lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl DaemonState {
    /// Graceful shutdown: stop accepting (the caller drops the listener),
    /// drain pipelines, stop collectors, close the bus.
    pub async fn shutdown(&self) {
        info!("daemon shutting down");
        self.scheduler.close().await;
        self.collector.close();
        self.manager.close().await;
        self.metrics_sink.close().await;
        let _ = std::fs::remove_file(&self.paths.socket_path);
        info!("shutdown complete");
    }
}

/// Wire up every component and bind the listener socket.
pub async fn startup(config: Config, paths: Paths) -> Result<(DaemonState, Listener), LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;
    std::fs::create_dir_all(&paths.volumes_path)?;
    std::fs::create_dir_all(&paths.workdir_path)?;

    let lock_file = acquire_pid_lock(&paths.lock_path)?;

    // Stale socket from an unclean exit; the PID lock already proves we
    // are the only daemon.
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let unix = UnixListener::bind(&paths.socket_path)?;

    let persist_available = paths.persist_socket_path.exists();
    let persist = select_client(
        paths.persist_socket_path.clone(),
        env::ipc_timeout(),
        config.state.pool_size,
        false,
    )
    .await?;

    let bus = EventBus::new(config.buffers.pubsub_buffer_size);
    let log_dir = config.log_dir(&paths.state_dir);
    sweep_retention(&log_dir, config.log_persistence.retention_days);
    let pipeline = Arc::new(LogPipeline::start(
        PipelineConfig::new(log_dir, config.spill_dir(&paths.state_dir))
            .queue_size(config.log_persistence.queue_size)
            .batch_size(config.log_persistence.batch_size)
            .flush_interval(config.flush_interval())
            .overflow(config.overflow_strategy()?)
            .memory_limit(config.log_persistence.memory_limit),
    )?);
    let metrics_sink = Arc::new(MetricsSink::start(
        MetricsSinkConfig::new(config.metrics_dir(&paths.state_dir))
            .batch_size(config.metrics.storage.batch_size)
            .flush_interval(Duration::from_millis(config.metrics.storage.flush_interval_ms)),
        bus.clone(),
    )?);

    // Without a persistence daemon the in-memory buffers would grow
    // unbounded, so memory-only mode skips them.
    let mut manager_config =
        ManagerConfig { persistence_enabled: persist_available, ..ManagerConfig::default() };
    if let Some(window) = env::drain_window() {
        manager_config.drain_window = window;
    }
    let manager = Arc::new(JobManager::new(
        Arc::new(JobStore::new()),
        bus,
        pipeline,
        persist,
        manager_config,
    ));
    if let Err(e) = manager.sync_from_persistent_state().await {
        warn!(error = %e, "state sync failed; starting with an empty job set");
    }

    let volumes = Arc::new(VolumeStore::new());
    let networks = Arc::new(NetworkStore::with_builtins().map_err(|e| {
        LifecycleError::Engine(EngineError::store("seed builtin networks", e))
    })?);
    let collector = Arc::new(MetricsCollector::new(Arc::clone(&metrics_sink)));

    let (due_tx, due_rx) = tokio::sync::mpsc::channel(256);
    let scheduler = Arc::new(Scheduler::start(due_tx));

    let runner = Arc::new(JobRunner::new(
        Arc::clone(&manager),
        Arc::new(ProcessDriver::new()),
        Arc::clone(&collector),
        Arc::clone(&networks),
        Arc::clone(&volumes),
        Arc::clone(&scheduler),
        paths.workdir_path.clone(),
        config.sample_interval(),
        config.metrics.enabled,
    ));
    tokio::spawn(Arc::clone(&runner).serve_scheduled(due_rx));

    let catalog = Arc::new(StoreCatalog::new(
        Arc::clone(&volumes),
        Arc::clone(&networks),
        config.runtimes.available.clone(),
    ));
    let executor = Arc::new(WorkflowExecutor::new(
        Arc::clone(&manager),
        Arc::new(Arc::clone(&runner)),
        catalog,
    ));

    let ctx = Arc::new(ListenCtx {
        runner: Arc::clone(&runner),
        manager: Arc::clone(&manager),
        executor: Arc::clone(&executor),
        volumes,
        networks,
        metrics_sink: Arc::clone(&metrics_sink),
        sampler: Mutex::new(SystemSampler::new()),
        volumes_root: paths.volumes_path.clone(),
        start_time: Instant::now(),
    });
    let listener = Listener::new(unix, ctx);
    crate::listener::info_ready(&paths.socket_path);

    let state = DaemonState {
        paths,
        manager,
        runner,
        executor,
        collector,
        scheduler,
        metrics_sink,
        lock_file,
    };
    Ok((state, listener))
}

fn acquire_pid_lock(lock_path: &std::path::Path) -> Result<File, LifecycleError> {
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(LifecycleError::AlreadyRunning(lock_path.to_path_buf()));
    }
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

/// Delete primary log files older than the retention window.
fn sweep_retention(log_dir: &std::path::Path, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };
    let cutoff = SystemTime::now() - Duration::from_secs(u64::from(retention_days) * 86_400);
    let mut removed = 0usize;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(".log") {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if modified < cutoff {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!(file = %entry.path().display(), error = %e, "retention removal failed");
            } else {
                removed += 1;
            }
        }
    }
    if removed > 0 {
        info!(removed, retention_days, "retention sweep removed expired log files");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
