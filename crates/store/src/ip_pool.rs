// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allocatable IP addresses derived from a network's CIDR.

use crate::error::StoreError;
use ipnet::Ipv4Net;
use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;

/// Pool of host addresses for one network.
///
/// The network and broadcast addresses are excluded up front. Invariant:
/// `allocated` and `available` partition the initial host set.
pub struct IpPool {
    cidr: Ipv4Net,
    available: VecDeque<Ipv4Addr>,
    allocated: HashSet<Ipv4Addr>,
}

impl IpPool {
    /// Build a pool from CIDR notation (e.g. `10.0.0.0/24`).
    pub fn from_cidr(network: &str, cidr: &str) -> Result<Self, StoreError> {
        let net: Ipv4Net = cidr.parse().map_err(|e| StoreError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: format!("{e}"),
        })?;
        if net.prefix_len() > 30 {
            return Err(StoreError::InvalidCidr {
                cidr: cidr.to_string(),
                reason: "prefix leaves no allocatable hosts".to_string(),
            });
        }
        let _ = network;
        Ok(Self {
            cidr: net,
            available: net.hosts().collect(),
            allocated: HashSet::new(),
        })
    }

    pub fn cidr(&self) -> Ipv4Net {
        self.cidr
    }

    /// Pop the next free address and mark it allocated.
    pub fn allocate(&mut self, network: &str) -> Result<Ipv4Addr, StoreError> {
        let ip = self
            .available
            .pop_front()
            .ok_or_else(|| StoreError::PoolExhausted(network.to_string()))?;
        self.allocated.insert(ip);
        Ok(ip)
    }

    /// Return a previously allocated address to the pool.
    pub fn release(&mut self, network: &str, ip: Ipv4Addr) -> Result<(), StoreError> {
        if !self.allocated.remove(&ip) {
            return Err(StoreError::IpNotAllocated {
                network: network.to_string(),
                ip: ip.to_string(),
            });
        }
        self.available.push_back(ip);
        Ok(())
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}

/// Locally-administered MAC derived from the allocated IPv4 address.
///
/// `02:4a` prefix (locally administered, unicast) + the four IP octets,
/// so the mapping is deterministic per allocation.
pub(crate) fn mac_for_ip(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("02:4a:{a:02x}:{b:02x}:{c:02x}:{d:02x}")
}

#[cfg(test)]
#[path = "ip_pool_tests.rs"]
mod tests;
