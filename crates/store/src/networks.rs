// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed registry of networks, their IP pools, and job attachments.

use crate::error::StoreError;
use crate::guard::CloseGuard;
use crate::ip_pool::{mac_for_ip, IpPool};
use jl_core::{JobNetworkAllocation, NetworkConfig, NetworkType};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Default address range for the built-in bridge network.
pub const DEFAULT_BRIDGE_CIDR: &str = "172.20.0.0/16";

/// Concurrency-safe network registry.
///
/// Each CIDR-bearing network owns an [`IpPool`] behind its own lock, so
/// allocation on one network never contends with another. Attachments are
/// keyed by job uuid; a job holds at most one allocation.
pub struct NetworkStore {
    networks: RwLock<HashMap<String, NetworkConfig>>,
    pools: RwLock<HashMap<String, Arc<Mutex<IpPool>>>>,
    allocations: RwLock<HashMap<String, JobNetworkAllocation>>,
    guard: CloseGuard,
}

impl NetworkStore {
    /// Empty store without the built-in networks (tests mostly want this).
    pub fn new() -> Self {
        Self {
            networks: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
            allocations: RwLock::new(HashMap::new()),
            guard: CloseGuard::default(),
        }
    }

    /// Store pre-seeded with the built-in `bridge`, `none`, and `isolated`
    /// networks.
    pub fn with_builtins() -> Result<Self, StoreError> {
        let store = Self::new();
        store.create(
            NetworkConfig::new("bridge", NetworkType::Bridge)
                .cidr(DEFAULT_BRIDGE_CIDR)
                .bridge_name("jl0"),
        )?;
        store.create(NetworkConfig::new("none", NetworkType::None))?;
        store.create(NetworkConfig::new("isolated", NetworkType::None))?;
        Ok(store)
    }

    /// Register a network. CIDR-bearing networks get an IP pool; the CIDR
    /// and gateway are validated here so workflows never hit a bad pool at
    /// runtime.
    pub fn create(&self, config: NetworkConfig) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let pool = if config.cidr.is_empty() {
            None
        } else {
            let pool = IpPool::from_cidr(&config.name, &config.cidr)?;
            if !config.gateway.is_empty() {
                let gateway: Ipv4Addr =
                    config.gateway.parse().map_err(|_| StoreError::InvalidGateway {
                        network: config.name.clone(),
                        gateway: config.gateway.clone(),
                    })?;
                if !pool.cidr().contains(&gateway) {
                    return Err(StoreError::InvalidGateway {
                        network: config.name.clone(),
                        gateway: config.gateway.clone(),
                    });
                }
            }
            Some(pool)
        };

        let mut networks = self.networks.write();
        if networks.contains_key(&config.name) {
            return Err(StoreError::already_exists("network", &config.name));
        }
        if let Some(pool) = pool {
            self.pools.write().insert(config.name.clone(), Arc::new(Mutex::new(pool)));
        }
        networks.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<NetworkConfig, StoreError> {
        let _open = self.guard.enter()?;
        self.networks
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("network", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.networks.read().contains_key(name)
    }

    pub fn list(&self) -> Result<Vec<NetworkConfig>, StoreError> {
        let _open = self.guard.enter()?;
        Ok(self.networks.read().values().cloned().collect())
    }

    /// Replace a network's record. The CIDR is immutable — changing it
    /// would orphan live allocations in the pool.
    pub fn update(&self, config: NetworkConfig) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let mut networks = self.networks.write();
        match networks.get_mut(&config.name) {
            Some(slot) => {
                if slot.cidr != config.cidr {
                    return Err(StoreError::InvalidCidr {
                        cidr: config.cidr,
                        reason: "cidr cannot change on an existing network".to_string(),
                    });
                }
                *slot = config;
                Ok(())
            }
            None => Err(StoreError::not_found("network", &config.name)),
        }
    }

    /// Remove a network; refused while jobs are attached to it.
    pub fn remove(&self, name: &str) -> Result<NetworkConfig, StoreError> {
        let _open = self.guard.enter()?;
        let in_use = self
            .allocations
            .read()
            .values()
            .filter(|a| a.network_name == name)
            .count();
        if in_use > 0 {
            return Err(StoreError::NetworkInUse { name: name.to_string(), count: in_use });
        }
        let mut networks = self.networks.write();
        let config = networks
            .remove(name)
            .ok_or_else(|| StoreError::not_found("network", name))?;
        self.pools.write().remove(name);
        Ok(config)
    }

    /// Attach a job to a network, drawing an IP from the pool atomically
    /// with the assignment. Networks without a pool (host/none) yield an
    /// allocation with an empty address.
    pub fn attach(
        &self,
        job_uuid: &str,
        network_name: &str,
        hostname: &str,
        assigned_at_ms: u64,
    ) -> Result<JobNetworkAllocation, StoreError> {
        let _open = self.guard.enter()?;
        if !self.exists(network_name) {
            return Err(StoreError::not_found("network", network_name));
        }
        {
            let allocations = self.allocations.read();
            if let Some(existing) = allocations.get(job_uuid) {
                return Err(StoreError::AlreadyAssigned {
                    job_uuid: job_uuid.to_string(),
                    network: existing.network_name.clone(),
                });
            }
        }

        let pool = self.pools.read().get(network_name).cloned();
        let (ip_address, mac_address) = match pool {
            Some(pool) => {
                let ip = pool.lock().allocate(network_name)?;
                (ip.to_string(), mac_for_ip(ip))
            }
            None => (String::new(), String::new()),
        };

        let allocation = JobNetworkAllocation {
            job_uuid: job_uuid.to_string(),
            network_name: network_name.to_string(),
            ip_address,
            mac_address,
            hostname: hostname.to_string(),
            assigned_at_ms,
        };
        self.allocations.write().insert(job_uuid.to_string(), allocation.clone());
        Ok(allocation)
    }

    /// Release a job's allocation, returning its IP to the pool.
    pub fn detach(&self, job_uuid: &str) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let allocation = self
            .allocations
            .write()
            .remove(job_uuid)
            .ok_or_else(|| StoreError::not_found("allocation", job_uuid))?;
        if allocation.ip_address.is_empty() {
            return Ok(());
        }
        let pool = self.pools.read().get(&allocation.network_name).cloned();
        if let Some(pool) = pool {
            let ip: Ipv4Addr = match allocation.ip_address.parse() {
                Ok(ip) => ip,
                Err(_) => {
                    tracing::warn!(
                        job_uuid,
                        ip = %allocation.ip_address,
                        "stored allocation holds unparsable ip"
                    );
                    return Ok(());
                }
            };
            if let Err(e) = pool.lock().release(&allocation.network_name, ip) {
                // Best effort: the network may have been recreated meanwhile.
                tracing::warn!(job_uuid, error = %e, "ip release failed");
            }
        }
        Ok(())
    }

    pub fn allocation_for(&self, job_uuid: &str) -> Option<JobNetworkAllocation> {
        self.allocations.read().get(job_uuid).cloned()
    }

    pub fn close(&self) {
        self.guard.close();
    }
}

impl Default for NetworkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "networks_tests.rs"]
mod tests;
