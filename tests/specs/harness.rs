// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scaffolding for the scenario specs.

use jl_engine::{
    EventBus, FakePersist, JobManager, JobRunner, LogPipeline, ManagerConfig, MetricsCollector,
    MetricsSink, MetricsSinkConfig, PipelineConfig, Scheduler, StoreCatalog, WorkflowExecutor,
};
use jl_sandbox::{FakeDriver, FakeScript};
use jl_store::{JobStore, NetworkStore, VolumeStore};
use std::sync::Arc;
use std::time::Duration;

pub struct Stack {
    pub manager: Arc<JobManager>,
    pub runner: Arc<JobRunner>,
    pub executor: Arc<WorkflowExecutor>,
    pub driver: Arc<FakeDriver>,
    pub volumes: Arc<VolumeStore>,
    pub networks: Arc<NetworkStore>,
    pub dir: tempfile::TempDir,
}

/// Full in-process stack with a scripted sandbox driver.
pub fn stack(script: FakeScript) -> Stack {
    let dir = tempfile::tempdir().expect("tempdir");
    let bus = EventBus::new(1024);
    let pipeline = Arc::new(
        LogPipeline::start(
            PipelineConfig::new(dir.path().join("logs"), dir.path().join("spill"))
                .flush_interval(Duration::from_millis(20)),
        )
        .expect("pipeline"),
    );
    let sink = Arc::new(
        MetricsSink::start(MetricsSinkConfig::new(dir.path().join("metrics")), bus.clone())
            .expect("metrics sink"),
    );
    let manager = Arc::new(JobManager::new(
        Arc::new(JobStore::new()),
        bus,
        pipeline,
        FakePersist::new(),
        ManagerConfig { persistence_enabled: true, drain_window: Duration::from_millis(100) },
    ));
    let driver = Arc::new(FakeDriver::with_script(script));
    let volumes = Arc::new(VolumeStore::new());
    let networks = Arc::new(NetworkStore::with_builtins().expect("builtins"));
    let (due_tx, due_rx) = tokio::sync::mpsc::channel(32);
    let scheduler = Arc::new(Scheduler::start(due_tx));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&manager),
        driver.clone(),
        Arc::new(MetricsCollector::new(sink)),
        Arc::clone(&networks),
        Arc::clone(&volumes),
        scheduler,
        dir.path().join("work"),
        Duration::from_secs(1),
        false,
    ));
    tokio::spawn(Arc::clone(&runner).serve_scheduled(due_rx));

    let catalog = Arc::new(StoreCatalog::new(
        Arc::clone(&volumes),
        Arc::clone(&networks),
        Vec::new(),
    ));
    let executor = Arc::new(WorkflowExecutor::new(
        Arc::clone(&manager),
        Arc::new(Arc::clone(&runner)),
        catalog,
    ));

    Stack { manager, runner, executor, driver, volumes, networks, dir }
}

/// Poll until `check` passes or the deadline expires.
pub async fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub const SPEC_WAIT: Duration = Duration::from_secs(5);
