// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted sandbox driver for tests.

use crate::driver::{
    RawCounters, ResourceReader, Sandbox, SandboxDriver, SandboxError, SandboxSpec, StdioReader,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// What a fake sandbox should do when started.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// Simulated run time before `wait` returns
    pub run_for: Duration,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self { stdout: Vec::new(), stderr: Vec::new(), exit_code: 0, run_for: Duration::ZERO }
    }
}

impl FakeScript {
    pub fn succeeding(stdout: &str) -> Self {
        Self { stdout: stdout.as_bytes().to_vec(), ..Default::default() }
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self { stderr: stderr.as_bytes().to_vec(), exit_code, ..Default::default() }
    }
}

/// Counter reader returning a scripted sequence of snapshots.
///
/// The last snapshot repeats once the sequence is exhausted.
pub struct FakeResourceReader {
    samples: Mutex<VecDeque<RawCounters>>,
    last: Mutex<RawCounters>,
}

impl FakeResourceReader {
    pub fn new(samples: Vec<RawCounters>) -> Self {
        Self { samples: Mutex::new(samples.into()), last: Mutex::new(RawCounters::default()) }
    }
}

impl ResourceReader for FakeResourceReader {
    fn sample(&self) -> Result<RawCounters, SandboxError> {
        match self.samples.lock().pop_front() {
            Some(sample) => {
                *self.last.lock() = sample.clone();
                Ok(sample)
            }
            None => Ok(self.last.lock().clone()),
        }
    }
}

/// Driver handing out scripted sandboxes; records every prepared spec.
#[derive(Default)]
pub struct FakeDriver {
    script: Mutex<FakeScript>,
    counters: Mutex<Vec<RawCounters>>,
    prepared: Mutex<Vec<SandboxSpec>>,
    signals: Arc<Mutex<Vec<(String, i32)>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: FakeScript) -> Self {
        Self { script: Mutex::new(script), ..Default::default() }
    }

    /// Replace the script used for subsequently prepared sandboxes.
    pub fn set_script(&self, script: FakeScript) {
        *self.script.lock() = script;
    }

    pub fn set_counters(&self, counters: Vec<RawCounters>) {
        *self.counters.lock() = counters;
    }

    /// Specs of every sandbox prepared so far.
    pub fn prepared_specs(&self) -> Vec<SandboxSpec> {
        self.prepared.lock().clone()
    }

    /// `(job_uuid, signal)` pairs delivered across all sandboxes.
    pub fn delivered_signals(&self) -> Vec<(String, i32)> {
        self.signals.lock().clone()
    }
}

#[async_trait]
impl SandboxDriver for FakeDriver {
    async fn prepare(&self, spec: SandboxSpec) -> Result<Box<dyn Sandbox>, SandboxError> {
        self.prepared.lock().push(spec.clone());
        Ok(Box::new(FakeSandbox {
            job_uuid: spec.job_uuid,
            script: self.script.lock().clone(),
            counters: self.counters.lock().clone(),
            signals: Arc::clone(&self.signals),
            last_signal: Arc::new(Mutex::new(None)),
            signalled: Arc::new(tokio::sync::Notify::new()),
            started: false,
            stdio_taken: false,
        }))
    }
}

struct FakeSandbox {
    job_uuid: String,
    script: FakeScript,
    counters: Vec<RawCounters>,
    signals: Arc<Mutex<Vec<(String, i32)>>>,
    last_signal: Arc<Mutex<Option<i32>>>,
    signalled: Arc<tokio::sync::Notify>,
    started: bool,
    stdio_taken: bool,
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn start(&mut self) -> Result<(u32, Arc<dyn ResourceReader>), SandboxError> {
        self.started = true;
        let reader = Arc::new(FakeResourceReader::new(self.counters.clone()));
        Ok((4242, reader))
    }

    fn signal(&self, signal: i32) -> Result<(), SandboxError> {
        if !self.started {
            return Err(SandboxError::NotStarted);
        }
        self.signals.lock().push((self.job_uuid.clone(), signal));
        *self.last_signal.lock() = Some(signal);
        self.signalled.notify_one();
        Ok(())
    }

    async fn wait(&mut self) -> Result<i32, SandboxError> {
        if !self.started {
            return Err(SandboxError::NotStarted);
        }
        if let Some(signal) = *self.last_signal.lock() {
            return Ok(128 + signal);
        }
        tokio::select! {
            _ = tokio::time::sleep(self.script.run_for) => Ok(self.script.exit_code),
            _ = self.signalled.notified() => {
                let signal = (*self.last_signal.lock()).unwrap_or(15);
                Ok(128 + signal)
            }
        }
    }

    fn attach_stdio(&mut self) -> Result<(StdioReader, StdioReader), SandboxError> {
        if self.stdio_taken {
            return Err(SandboxError::StdioTaken);
        }
        self.stdio_taken = true;
        let stdout: StdioReader = Box::new(std::io::Cursor::new(self.script.stdout.clone()));
        let stderr: StdioReader = Box::new(std::io::Cursor::new(self.script.stderr.clone()));
        Ok((stdout, stderr))
    }

    async fn teardown(&mut self) -> Result<(), SandboxError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
