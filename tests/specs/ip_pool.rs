// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IP pool exhaustion and reuse.

use jl_core::{NetworkConfig, NetworkType};
use jl_store::{NetworkStore, StoreError};

#[test]
fn slash_30_exhausts_after_two_and_reuses_released() {
    let store = NetworkStore::new();
    store
        .create(NetworkConfig::new("tiny", NetworkType::Custom).cidr("10.0.0.0/30"))
        .unwrap();

    let first = store.attach("job-1", "tiny", "h1", 1).unwrap();
    let second = store.attach("job-2", "tiny", "h2", 2).unwrap();
    assert_eq!(first.ip_address, "10.0.0.1");
    assert_eq!(second.ip_address, "10.0.0.2");

    let err = store.attach("job-3", "tiny", "h3", 3).unwrap_err();
    assert_eq!(err.to_string(), "no available IP addresses in network tiny");

    store.detach("job-1").unwrap();
    let reused = store.attach("job-3", "tiny", "h3", 4).unwrap();
    assert_eq!(reused.ip_address, "10.0.0.1");
}

#[test]
fn network_removal_blocked_while_allocated() {
    let store = NetworkStore::new();
    store
        .create(NetworkConfig::new("lab", NetworkType::Custom).cidr("10.1.0.0/24"))
        .unwrap();
    store.attach("job-1", "lab", "h", 1).unwrap();

    assert!(matches!(store.remove("lab"), Err(StoreError::NetworkInUse { count: 1, .. })));
    store.detach("job-1").unwrap();
    store.remove("lab").unwrap();
}
