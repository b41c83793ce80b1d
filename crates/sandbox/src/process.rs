// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain child-process sandbox.
//!
//! Runs the command as an ordinary child with piped stdio — no namespace or
//! cgroup isolation. This is the portable fallback driver; isolated drivers
//! implement the same traits out of tree.

use crate::driver::{
    RawCounters, RawCpu, RawIo, RawMemory, RawProcess, ResourceReader, Sandbox, SandboxDriver,
    SandboxError, SandboxSpec, StdioReader,
};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::{Child, Command};

/// Driver that executes jobs as plain child processes.
#[derive(Default)]
pub struct ProcessDriver;

impl ProcessDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SandboxDriver for ProcessDriver {
    async fn prepare(&self, spec: SandboxSpec) -> Result<Box<dyn Sandbox>, SandboxError> {
        stage_uploads(&spec.workdir, &spec.uploads)?;
        Ok(Box::new(ProcessSandbox { spec, child: None, pid: None }))
    }
}

/// Write uploaded files into the working directory before start.
fn stage_uploads(workdir: &Path, uploads: &[jl_core::FileUpload]) -> Result<(), SandboxError> {
    fs::create_dir_all(workdir)?;
    for upload in uploads {
        let dest = workdir.join(&upload.path);
        if upload.is_dir {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &upload.content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest, fs::Permissions::from_mode(upload.mode))?;
        }
    }
    Ok(())
}

struct ProcessSandbox {
    spec: SandboxSpec,
    child: Option<Child>,
    pid: Option<u32>,
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn start(&mut self) -> Result<(u32, Arc<dyn ResourceReader>), SandboxError> {
        let mut command = Command::new(&self.spec.command);
        command
            .args(&self.spec.args)
            .current_dir(&self.spec.workdir)
            .envs(&self.spec.env)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in self.spec.secret_env.entries() {
            command.env(key, value);
        }
        if !self.spec.hostname.is_empty() {
            command.env("HOSTNAME", &self.spec.hostname);
        }

        let child = command
            .spawn()
            .map_err(|e| SandboxError::Start(format!("{}: {e}", self.spec.command)))?;
        let pid = child.id().ok_or_else(|| SandboxError::Start("child exited at spawn".into()))?;
        self.child = Some(child);
        self.pid = Some(pid);
        tracing::debug!(job_uuid = %self.spec.job_uuid, pid, "child process started");
        Ok((pid, Arc::new(ProcReader { pid })))
    }

    fn signal(&self, signal: i32) -> Result<(), SandboxError> {
        let pid = self.pid.ok_or(SandboxError::NotStarted)?;
        let signal = Signal::try_from(signal).map_err(|e| SandboxError::Signal(e.to_string()))?;
        kill(Pid::from_raw(pid as i32), signal).map_err(|e| SandboxError::Signal(e.to_string()))
    }

    async fn wait(&mut self) -> Result<i32, SandboxError> {
        let child = self.child.as_mut().ok_or(SandboxError::NotStarted)?;
        let status = child.wait().await?;
        #[cfg(unix)]
        let code = {
            use std::os::unix::process::ExitStatusExt;
            status.code().unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
        };
        #[cfg(not(unix))]
        let code = status.code().unwrap_or(-1);
        Ok(code)
    }

    fn attach_stdio(&mut self) -> Result<(StdioReader, StdioReader), SandboxError> {
        let child = self.child.as_mut().ok_or(SandboxError::NotStarted)?;
        let stdout = child.stdout.take().ok_or(SandboxError::StdioTaken)?;
        let stderr = child.stderr.take().ok_or(SandboxError::StdioTaken)?;
        Ok((Box::new(stdout), Box::new(stderr)))
    }

    async fn teardown(&mut self) -> Result<(), SandboxError> {
        if let Some(mut child) = self.child.take() {
            // Reap if still running; kill_on_drop covers the hard path.
            if child.try_wait()?.is_none() {
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}

/// Counter reader backed by procfs for a plain child process.
struct ProcReader {
    pid: u32,
}

impl ResourceReader for ProcReader {
    fn sample(&self) -> Result<RawCounters, SandboxError> {
        let root = PathBuf::from(format!("/proc/{}", self.pid));
        Ok(RawCounters {
            cpu: read_cpu(&root),
            memory: read_memory(&root),
            io: read_io(&root),
            network: Default::default(),
            process: read_process(&root),
            gpu: Vec::new(),
        })
    }
}

/// Kernel clock ticks per second; 100 on every mainstream Linux config.
const TICKS_PER_SEC: u64 = 100;

fn read_cpu(root: &Path) -> RawCpu {
    let Ok(stat) = fs::read_to_string(root.join("stat")) else {
        return RawCpu::default();
    };
    // utime and stime are fields 14 and 15; the comm field (2) may contain
    // spaces, so scan from the closing paren.
    let Some(rest) = stat.rsplit(')').next() else {
        return RawCpu::default();
    };
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime_ticks: u64 = fields.get(11).and_then(|v| v.parse().ok()).unwrap_or(0);
    let stime_ticks: u64 = fields.get(12).and_then(|v| v.parse().ok()).unwrap_or(0);
    let user_usec = utime_ticks * 1_000_000 / TICKS_PER_SEC;
    let system_usec = stime_ticks * 1_000_000 / TICKS_PER_SEC;
    RawCpu {
        usage_usec: user_usec + system_usec,
        user_usec,
        system_usec,
        nr_periods: 0,
        nr_throttled: 0,
    }
}

fn read_memory(root: &Path) -> RawMemory {
    let Ok(status) = fs::read_to_string(root.join("status")) else {
        return RawMemory::default();
    };
    let field_kb = |name: &str| -> u64 {
        status
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };
    RawMemory {
        current_bytes: field_kb("VmRSS:") * 1024,
        peak_bytes: field_kb("VmHWM:") * 1024,
        anon_bytes: field_kb("RssAnon:") * 1024,
        file_bytes: field_kb("RssFile:") * 1024,
        major_faults: 0,
        oom_events: 0,
    }
}

fn read_io(root: &Path) -> RawIo {
    let Ok(io) = fs::read_to_string(root.join("io")) else {
        return RawIo::default();
    };
    let field = |name: &str| -> u64 {
        io.lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };
    RawIo {
        read_bytes: field("read_bytes:"),
        write_bytes: field("write_bytes:"),
        read_ops: field("syscr:"),
        write_ops: field("syscw:"),
    }
}

fn read_process(root: &Path) -> RawProcess {
    let threads = fs::read_to_string(root.join("status"))
        .ok()
        .and_then(|s| {
            s.lines()
                .find(|l| l.starts_with("Threads:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|v| v.parse::<u64>().ok())
        })
        .unwrap_or(0);
    let open_fds = fs::read_dir(root.join("fd")).map(|d| d.count() as u64).unwrap_or(0);
    RawProcess { process_count: 1, thread_count: threads, open_fds }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
