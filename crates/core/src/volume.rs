// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume record.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// Disk-backed, survives job teardown
    Filesystem,
    /// tmpfs-backed
    Memory,
}

crate::simple_display! {
    VolumeType {
        Filesystem => "filesystem",
        Memory => "memory",
    }
}

/// A named volume mountable into job sandboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    #[serde(rename = "type")]
    pub volume_type: VolumeType,
    pub size_bytes: u64,
    /// Backing path; filesystem volumes only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub created_at_ms: u64,
    /// Number of jobs currently referencing this volume
    #[serde(default)]
    pub job_count: u32,
}

impl Volume {
    pub fn new(
        name: impl Into<String>,
        volume_type: VolumeType,
        size_bytes: u64,
        created_at_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            volume_type,
            size_bytes,
            path: None,
            created_at_ms,
            job_count: 0,
        }
    }
}

#[cfg(test)]
#[path = "volume_tests.rs"]
mod tests;
