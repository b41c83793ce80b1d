// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jl_core::VolumeType;

fn volume(name: &str) -> Volume {
    Volume::new(name, VolumeType::Filesystem, 1 << 20, 1_000)
}

#[test]
fn create_get_list() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();
    store.create(volume("cache")).unwrap();

    assert_eq!(store.get("data").unwrap().name, "data");
    assert_eq!(store.list().unwrap().len(), 2);
    assert!(store.exists("cache"));
    assert!(!store.exists("other"));
}

#[test]
fn create_conflict() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();
    assert!(matches!(
        store.create(volume("data")),
        Err(StoreError::AlreadyExists { kind: "volume", .. })
    ));
}

#[test]
fn remove_gated_on_ref_count() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();

    assert_eq!(store.increment_ref("data").unwrap(), 1);
    assert_eq!(
        store.remove("data").err(),
        Some(StoreError::VolumeInUse { name: "data".into(), count: 1 })
    );

    assert_eq!(store.decrement_ref("data").unwrap(), 0);
    store.remove("data").unwrap();
    assert!(!store.exists("data"));
}

#[test]
fn ref_count_never_goes_negative() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();
    assert_eq!(store.decrement_ref("data").unwrap(), 0);
    assert_eq!(store.get("data").unwrap().job_count, 0);
}

#[test]
fn ref_count_round_trip() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();
    assert_eq!(store.increment_ref("data").unwrap(), 1);
    assert_eq!(store.increment_ref("data").unwrap(), 2);
    assert_eq!(store.decrement_ref("data").unwrap(), 1);
    assert_eq!(store.decrement_ref("data").unwrap(), 0);
}

#[test]
fn update_preserves_ref_count() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();
    store.increment_ref("data").unwrap();

    let mut changed = volume("data");
    changed.size_bytes = 42;
    changed.job_count = 99; // ignored
    store.update(changed).unwrap();

    let stored = store.get("data").unwrap();
    assert_eq!(stored.size_bytes, 42);
    assert_eq!(stored.job_count, 1);
}

#[test]
fn update_unknown_volume() {
    let store = VolumeStore::new();
    assert!(matches!(store.update(volume("ghost")), Err(StoreError::NotFound { .. })));
}

#[test]
fn closed_store_refuses() {
    let store = VolumeStore::new();
    store.create(volume("data")).unwrap();
    store.close();
    assert_eq!(store.get("data").err(), Some(StoreError::Closed));
    assert_eq!(store.increment_ref("data").err(), Some(StoreError::Closed));
}
