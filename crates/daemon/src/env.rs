// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Server version reported in handshakes and system status.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: JL_STATE_DIR > XDG_STATE_HOME/joblet > ~/.local/state/joblet
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("JL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("joblet"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/joblet"))
}

/// Optional config file override.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("JL_CONFIG").ok().map(PathBuf::from)
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    std::env::var("JL_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Drain window override, mainly for test suites that want short windows.
pub fn drain_window() -> Option<Duration> {
    std::env::var("JL_DRAIN_WINDOW_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}
