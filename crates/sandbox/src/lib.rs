// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jl-sandbox: Capability interface for isolated job execution.
//!
//! The engine only ever talks to [`SandboxDriver`] / [`Sandbox`];
//! namespace, cgroup, and network construction live behind implementations
//! of this crate's traits.

mod driver;
#[cfg(any(test, feature = "test-support"))]
mod fake;
mod process;

pub use driver::{
    RawCounters, RawCpu, RawGpu, RawIo, RawMemory, RawNetwork, RawProcess, ResourceReader,
    Sandbox, SandboxDriver, SandboxError, SandboxSpec, StdioReader,
};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeDriver, FakeResourceReader, FakeScript};
pub use process::ProcessDriver;
