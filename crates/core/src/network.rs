// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network configuration and per-job address allocation records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Shared bridge with NAT
    Bridge,
    /// Host network namespace
    Host,
    /// No network access
    None,
    /// User-defined bridge with its own CIDR
    Custom,
}

crate::simple_display! {
    NetworkType {
        Bridge => "bridge",
        Host => "host",
        None => "none",
        Custom => "custom",
    }
}

/// A named network jobs can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    /// Address range for bridge/custom networks, empty otherwise
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub bridge_name: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl NetworkConfig {
    pub fn new(name: impl Into<String>, network_type: NetworkType) -> Self {
        Self {
            name: name.into(),
            network_type,
            cidr: String::new(),
            bridge_name: String::new(),
            gateway: String::new(),
            dns: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    crate::setters! {
        into {
            cidr: String,
            bridge_name: String,
            gateway: String,
        }
        set {
            dns: Vec<String>,
        }
    }
}

/// Address assignment binding one job to one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNetworkAllocation {
    pub job_uuid: String,
    pub network_name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub hostname: String,
    pub assigned_at_ms: u64,
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
