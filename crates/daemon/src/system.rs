// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-level status sampling.

use crate::env::SERVER_VERSION;
use jl_wire::{
    CpuInfo, DiskInfo, HostInfo, MemoryInfo, NetworkInterfaceInfo, ProcessInfo, SystemStatus,
};
use sysinfo::{Disks, Networks, System};

/// How many processes the top-by-cpu/memory lists carry.
const TOP_PROCESSES: usize = 10;

/// Reusable sampler; refreshing an existing `System` keeps CPU usage
/// deltas meaningful between calls.
pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self { system: System::new_all() }
    }

    /// Snapshot the host. Call at the stream interval; CPU percentages
    /// are derived from the time since the previous refresh.
    pub fn sample(&mut self) -> SystemStatus {
        self.system.refresh_all();

        let cpus = self.system.cpus();
        let per_core: Vec<f64> = cpus.iter().map(|c| f64::from(c.cpu_usage())).collect();
        let usage = if per_core.is_empty() {
            0.0
        } else {
            per_core.iter().sum::<f64>() / per_core.len() as f64
        };

        let mut by_cpu: Vec<ProcessInfo> = self
            .system
            .processes()
            .values()
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: f64::from(p.cpu_usage()),
                memory_bytes: p.memory(),
            })
            .collect();
        let mut by_memory = by_cpu.clone();
        by_cpu.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        by_cpu.truncate(TOP_PROCESSES);
        by_memory.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));
        by_memory.truncate(TOP_PROCESSES);

        let disks = Disks::new_with_refreshed_list()
            .iter()
            .map(|d| DiskInfo {
                mount_point: d.mount_point().to_string_lossy().into_owned(),
                total_bytes: d.total_space(),
                available_bytes: d.available_space(),
            })
            .collect();

        let networks = Networks::new_with_refreshed_list()
            .iter()
            .map(|(name, data)| NetworkInterfaceInfo {
                name: name.clone(),
                rx_bytes: data.total_received(),
                tx_bytes: data.total_transmitted(),
            })
            .collect();

        SystemStatus {
            host: HostInfo {
                hostname: System::host_name().unwrap_or_default(),
                os: System::long_os_version().unwrap_or_default(),
                kernel: System::kernel_version().unwrap_or_default(),
                uptime_secs: System::uptime(),
            },
            cpu: CpuInfo { cores: cpus.len(), usage_percent: usage, per_core_percent: per_core },
            memory: MemoryInfo {
                total_bytes: self.system.total_memory(),
                used_bytes: self.system.used_memory(),
                available_bytes: self.system.available_memory(),
                swap_total_bytes: self.system.total_swap(),
                swap_used_bytes: self.system.used_swap(),
            },
            disks,
            networks,
            top_by_cpu: by_cpu,
            top_by_memory: by_memory,
            cloud: detect_cloud(),
            server_version: SERVER_VERSION.to_string(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort cloud provider detection from DMI strings.
fn detect_cloud() -> String {
    let vendor = std::fs::read_to_string("/sys/class/dmi/id/sys_vendor").unwrap_or_default();
    let product = std::fs::read_to_string("/sys/class/dmi/id/product_name").unwrap_or_default();
    let haystack = format!("{vendor} {product}").to_lowercase();
    for (needle, provider) in [
        ("amazon", "aws"),
        ("google", "gcp"),
        ("microsoft", "azure"),
        ("digitalocean", "digitalocean"),
        ("openstack", "openstack"),
    ] {
        if haystack.contains(needle) {
            return provider.to_string();
        }
    }
    String::new()
}
