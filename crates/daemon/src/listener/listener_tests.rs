// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::system::SystemSampler;
use jl_core::JobStatus;
use jl_engine::{
    FakePersist, LogPipeline, ManagerConfig, MetricsCollector, MetricsSinkConfig, PipelineConfig,
    Scheduler,
};
use jl_sandbox::{FakeDriver, FakeScript};
use jl_store::JobStore;
use jl_wire::RunJobRequest;
use std::time::Duration;

fn build_ctx(dir: &tempfile::TempDir, script: FakeScript) -> Arc<ListenCtx> {
    let bus = jl_engine::EventBus::new(1024);
    let pipeline = Arc::new(
        LogPipeline::start(
            PipelineConfig::new(dir.path().join("logs"), dir.path().join("spill"))
                .flush_interval(Duration::from_millis(20)),
        )
        .unwrap(),
    );
    let metrics_sink = Arc::new(
        MetricsSink::start(
            MetricsSinkConfig::new(dir.path().join("metrics"))
                .flush_interval(Duration::from_millis(20)),
            bus.clone(),
        )
        .unwrap(),
    );
    let manager = Arc::new(JobManager::new(
        Arc::new(JobStore::new()),
        bus,
        pipeline,
        FakePersist::new(),
        ManagerConfig { persistence_enabled: true, drain_window: Duration::from_millis(50) },
    ));
    let volumes = Arc::new(VolumeStore::new());
    let networks = Arc::new(NetworkStore::with_builtins().unwrap());
    let (due_tx, due_rx) = tokio::sync::mpsc::channel(16);
    let scheduler = Arc::new(Scheduler::start(due_tx));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&manager),
        Arc::new(FakeDriver::with_script(script)),
        Arc::new(MetricsCollector::new(Arc::clone(&metrics_sink))),
        Arc::clone(&networks),
        Arc::clone(&volumes),
        scheduler,
        dir.path().join("work"),
        Duration::from_secs(1),
        false,
    ));
    tokio::spawn(Arc::clone(&runner).serve_scheduled(due_rx));
    let catalog = Arc::new(jl_engine::StoreCatalog::new(
        Arc::clone(&volumes),
        Arc::clone(&networks),
        vec!["python-3.11".to_string()],
    ));
    let executor = Arc::new(WorkflowExecutor::new(
        Arc::clone(&manager),
        Arc::new(Arc::clone(&runner)),
        catalog,
    ));

    Arc::new(ListenCtx {
        runner,
        manager,
        executor,
        volumes,
        networks,
        metrics_sink,
        sampler: Mutex::new(SystemSampler::new()),
        volumes_root: dir.path().join("volumes"),
        start_time: Instant::now(),
    })
}

const TIMEOUT: Duration = Duration::from_secs(2);

/// One request/response exchange over an in-memory connection.
async fn call(ctx: &Arc<ListenCtx>, request: Request) -> Response {
    let (client, server) = tokio::io::duplex(1 << 16);
    let (server_read, server_write) = tokio::io::split(server);
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let _ = handle_connection(server_read, server_write, &ctx).await;
    });

    let (mut client_read, mut client_write) = tokio::io::split(client);
    write_message(&mut client_write, &request, TIMEOUT).await.unwrap();
    read_message(&mut client_read, TIMEOUT).await.unwrap()
}

/// Issue a streaming request and collect frames until `StreamEnd`.
async fn call_stream(ctx: &Arc<ListenCtx>, request: Request) -> Vec<Response> {
    let (client, server) = tokio::io::duplex(1 << 16);
    let (server_read, server_write) = tokio::io::split(server);
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let _ = handle_connection(server_read, server_write, &ctx).await;
    });

    let (mut client_read, mut client_write) = tokio::io::split(client);
    write_message(&mut client_write, &request, TIMEOUT).await.unwrap();

    let mut frames = Vec::new();
    loop {
        let frame: Response = read_message(&mut client_read, TIMEOUT).await.unwrap();
        let done = matches!(frame, Response::StreamEnd | Response::Error { .. });
        frames.push(frame);
        if done {
            break;
        }
    }
    frames
}

async fn wait_status(ctx: &Arc<ListenCtx>, uuid: &str, status: JobStatus) {
    for _ in 0..200 {
        if ctx.manager.get(uuid).unwrap().status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {uuid} never reached {status}");
}

#[tokio::test]
async fn ping_pong() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());
    assert_eq!(call(&ctx, Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn hello_reports_server_version() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());
    match call(&ctx, Request::Hello { version: "0.1.0".into() }).await {
        Response::Hello { version } => assert_eq!(version, SERVER_VERSION),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn run_job_then_status_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::succeeding("hello from job\n"));

    let run = RunJobRequest { command: "/bin/echo".into(), ..Default::default() };
    let uuid = match call(&ctx, Request::RunJob(run)).await {
        Response::JobStarted { uuid, .. } => uuid,
        other => panic!("unexpected response {:?}", other),
    };
    wait_status(&ctx, &uuid, JobStatus::Completed).await;

    match call(&ctx, Request::GetJobStatus { uuid: uuid.clone() }).await {
        Response::Job { job } => {
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.exit_code, Some(0));
            assert_eq!(job.name, "echo");
        }
        other => panic!("unexpected response {:?}", other),
    }

    let frames = call_stream(&ctx, Request::GetJobLogs { uuid, skip_count: 0 }).await;
    let bytes: Vec<u8> = frames
        .iter()
        .filter_map(|f| match f {
            Response::LogChunk { bytes } => Some(bytes.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(bytes, b"hello from job\n");
    assert_eq!(frames.last(), Some(&Response::StreamEnd));
}

#[tokio::test]
async fn run_job_with_bad_schedule_is_invalid_argument() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());
    let run = RunJobRequest {
        command: "/bin/true".into(),
        schedule: "tomorrow-ish".into(),
        ..Default::default()
    };
    match call(&ctx, Request::RunJob(run)).await {
        Response::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidArgument),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());
    match call(&ctx, Request::GetJobStatus { uuid: "deadbeef".into() }).await {
        Response::Error { code, .. } => assert_eq!(code, ErrorCode::NotFound),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn delete_running_job_is_failed_precondition() {
    let dir = tempfile::tempdir().unwrap();
    let mut script = FakeScript::default();
    script.run_for = Duration::from_secs(30);
    let ctx = build_ctx(&dir, script);

    let run = RunJobRequest { command: "/bin/sleep".into(), ..Default::default() };
    let uuid = match call(&ctx, Request::RunJob(run)).await {
        Response::JobStarted { uuid, .. } => uuid,
        other => panic!("unexpected response {:?}", other),
    };
    wait_status(&ctx, &uuid, JobStatus::Running).await;

    match call(&ctx, Request::DeleteJob { uuid: uuid.clone() }).await {
        Response::Error { code, message } => {
            assert_eq!(code, ErrorCode::FailedPrecondition);
            assert!(message.contains("stop it first"));
        }
        other => panic!("unexpected response {:?}", other),
    }

    match call(&ctx, Request::StopJob { uuid: uuid.clone() }).await {
        Response::JobStopped { status } => assert_eq!(status, JobStatus::Stopped),
        other => panic!("unexpected response {:?}", other),
    }
    wait_status(&ctx, &uuid, JobStatus::Stopped).await;

    match call(&ctx, Request::DeleteJob { uuid }).await {
        Response::JobDeleted { success, .. } => assert!(success),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn volume_lifecycle_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());

    let created = call(
        &ctx,
        Request::CreateVolume {
            name: "data".into(),
            volume_type: "filesystem".into(),
            size_bytes: 1 << 20,
        },
    )
    .await;
    assert_eq!(created, Response::Ok);
    assert!(dir.path().join("volumes/data").is_dir());

    match call(&ctx, Request::ListVolumes).await {
        Response::Volumes { volumes } => {
            assert_eq!(volumes.len(), 1);
            assert_eq!(volumes[0].name, "data");
            assert_eq!(volumes[0].volume_type, "filesystem");
        }
        other => panic!("unexpected response {:?}", other),
    }

    assert_eq!(call(&ctx, Request::RemoveVolume { name: "data".into() }).await, Response::Ok);
    assert!(!dir.path().join("volumes/data").exists());
}

#[tokio::test]
async fn bad_volume_type_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());
    match call(
        &ctx,
        Request::CreateVolume { name: "x".into(), volume_type: "tape".into(), size_bytes: 0 },
    )
    .await
    {
        Response::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidArgument),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn network_crud_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());

    assert_eq!(
        call(&ctx, Request::CreateNetwork { name: "lab".into(), cidr: "10.5.0.0/24".into() }).await,
        Response::Ok
    );
    match call(&ctx, Request::ListNetworks).await {
        Response::Networks { networks } => {
            let names: Vec<&str> = networks.iter().map(|n| n.name.as_str()).collect();
            assert_eq!(names, vec!["bridge", "isolated", "lab", "none"]);
        }
        other => panic!("unexpected response {:?}", other),
    }
    assert_eq!(call(&ctx, Request::RemoveNetwork { name: "lab".into() }).await, Response::Ok);

    match call(&ctx, Request::CreateNetwork { name: "bad".into(), cidr: "nope".into() }).await {
        Response::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidArgument),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn cyclic_workflow_rejected_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());

    let run = jl_wire::RunWorkflowRequest {
        name: "cycle".into(),
        yaml_content: r#"
jobs:
  a:
    command: /bin/true
    requires: { b: COMPLETED }
  b:
    command: /bin/true
    requires: { a: COMPLETED }
"#
        .into(),
        ..Default::default()
    };
    match call(&ctx, Request::RunWorkflow(run)).await {
        Response::Error { code, message } => {
            assert_eq!(code, ErrorCode::InvalidArgument);
            assert!(message.contains("circular dependency"));
        }
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn workflow_runs_to_completion_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::succeeding(""));

    let run = jl_wire::RunWorkflowRequest {
        name: "pair".into(),
        yaml_content: r#"
jobs:
  first: { command: /bin/true }
  second:
    command: /bin/true
    requires: { first: COMPLETED }
"#
        .into(),
        ..Default::default()
    };
    let uuid = match call(&ctx, Request::RunWorkflow(run)).await {
        Response::WorkflowStarted { uuid } => uuid,
        other => panic!("unexpected response {:?}", other),
    };

    for _ in 0..400 {
        if let Response::Workflow { detail } =
            call(&ctx, Request::GetWorkflowStatus { uuid: uuid.clone() }).await
        {
            if detail.workflow.status == jl_core::WorkflowStatus::Completed {
                assert_eq!(detail.workflow.completed_jobs, 2);
                assert_eq!(detail.jobs.len(), 2);
                assert_eq!(detail.jobs[0].name, "first");
                assert_eq!(detail.jobs[1].name, "second");
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow never completed");
}

#[tokio::test]
async fn status_reports_active_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let mut script = FakeScript::default();
    script.run_for = Duration::from_secs(30);
    let ctx = build_ctx(&dir, script);

    let run = RunJobRequest { command: "/bin/sleep".into(), ..Default::default() };
    let uuid = match call(&ctx, Request::RunJob(run)).await {
        Response::JobStarted { uuid, .. } => uuid,
        other => panic!("unexpected response {:?}", other),
    };
    wait_status(&ctx, &uuid, JobStatus::Running).await;

    match call(&ctx, Request::Status).await {
        Response::Status { jobs_active, version, .. } => {
            assert_eq!(jobs_active, 1);
            assert_eq!(version, SERVER_VERSION);
        }
        other => panic!("unexpected response {:?}", other),
    }
    ctx.runner.stop(&uuid).unwrap();
}

#[tokio::test]
async fn job_metrics_stream_replays_history() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());

    let job = jl_core::Job::builder().status(JobStatus::Completed).build();
    let uuid = job.uuid.clone();
    ctx.manager.create(job).unwrap();
    for ts in [10, 20] {
        ctx.metrics_sink.record(jl_core::MetricsSample {
            job_uuid: uuid.clone(),
            timestamp_ms: ts,
            ..Default::default()
        });
    }
    // Let the sink's consumer flush the history file.
    tokio::time::sleep(Duration::from_millis(120)).await;

    let frames = call_stream(&ctx, Request::GetJobMetrics { uuid }).await;
    let timestamps: Vec<u64> = frames
        .iter()
        .filter_map(|f| match f {
            Response::MetricsSample { sample } => Some(sample.timestamp_ms),
            _ => None,
        })
        .collect();
    assert_eq!(timestamps, vec![10, 20]);
    assert_eq!(frames.last(), Some(&Response::StreamEnd));
}

#[tokio::test]
async fn system_status_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build_ctx(&dir, FakeScript::default());
    match call(&ctx, Request::GetSystemStatus).await {
        Response::SystemStatus { status } => {
            assert!(status.cpu.cores > 0);
            assert_eq!(status.server_version, SERVER_VERSION);
        }
        other => panic!("unexpected response {:?}", other),
    }
}
