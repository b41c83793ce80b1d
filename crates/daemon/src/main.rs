// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Joblet daemon entry point.

use jl_daemon::{config, env, lifecycle, startup, Config};
use tracing_subscriber::EnvFilter;

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(run());
    std::process::exit(code);
}

async fn run() -> i32 {
    let paths = match lifecycle::Paths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    if let Err(e) = std::fs::create_dir_all(&paths.state_dir) {
        eprintln!("cannot create state dir {}: {e}", paths.state_dir.display());
        return 1;
    }

    // Daemon log goes to a file; RUST_LOG still controls verbosity.
    let appender = tracing_appender::rolling::never(
        paths.state_dir.clone(),
        paths
            .daemon_log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jld.log".to_string()),
    );
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let config_path = env::config_path().unwrap_or_else(|| paths.state_dir.join("config.toml"));
    let config: Config = match config::Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let (state, listener) = match startup(config, paths).await {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("startup failed: {e}");
            return 1;
        }
    };

    // Clients wait for this line before connecting.
    println!("READY");

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(e) => {
            eprintln!("signal handler failed: {e}");
            return 1;
        }
    };
    tokio::select! {
        _ = listener.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
        }
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received");
        }
    }

    state.shutdown().await;
    0
}
