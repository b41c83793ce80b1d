// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jl-wire: RPC protocol for the Joblet daemon.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//! Streaming responses are a sequence of frames ending with `StreamEnd`.

mod framing;
mod request;
mod response;
mod types;

pub use framing::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_BYTES};
pub use request::{Request, RunJobRequest, RunWorkflowRequest};
pub use response::{ErrorCode, Response};
pub use types::{
    CpuInfo, DiskInfo, HostInfo, JobSummary, MemoryInfo, NetworkInterfaceInfo, ProcessInfo,
    SystemStatus, VolumeSummary, WorkflowDetail, WorkflowJobEntry, WorkflowSummary,
};
