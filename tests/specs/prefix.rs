// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UUID prefix resolution.

use super::harness::stack;
use jl_core::Job;
use jl_engine::EngineError;
use jl_sandbox::FakeScript;

#[tokio::test]
async fn ambiguous_prefix_lists_candidates() {
    let s = stack(FakeScript::default());

    let mut first = Job::builder().name("one").build();
    first.uuid = "f47ac10b-58cc-4372-a567-0e02b2c30001".to_string();
    let mut second = Job::builder().name("two").build();
    second.uuid = "f47ac10b-58cc-4372-a567-0e02b2c30002".to_string();
    s.manager.create(first.clone()).unwrap();
    s.manager.create(second.clone()).unwrap();

    match s.manager.resolve("f47ac10b").unwrap_err() {
        EngineError::Ambiguous { prefix, candidates } => {
            assert_eq!(prefix, "f47ac10b");
            assert_eq!(candidates, vec![first.uuid.clone(), second.uuid.clone()]);
        }
        other => panic!("expected ambiguous, got {other:?}"),
    }

    // Full uuids still resolve to themselves despite the shared prefix.
    assert_eq!(s.manager.resolve(&first.uuid).unwrap(), first.uuid);
    assert_eq!(s.manager.resolve(&second.uuid).unwrap(), second.uuid);
}

#[tokio::test]
async fn unique_prefixes_are_idempotent() {
    let s = stack(FakeScript::default());

    let mut job = Job::builder().name("solo").build();
    job.uuid = "aaaabbbb-1111-2222-3333-444455556666".to_string();
    s.manager.create(job.clone()).unwrap();
    let mut other = Job::builder().name("other").build();
    other.uuid = "f47ac10b-58cc-4372-a567-0e02b2c30001".to_string();
    s.manager.create(other).unwrap();

    // Every unique prefix resolves to the full uuid, and re-resolving the
    // result is the identity.
    for len in [4, 8, 20, 35] {
        let resolved = s.manager.resolve(&job.uuid[..len]).unwrap();
        assert_eq!(resolved, job.uuid);
        assert_eq!(s.manager.resolve(&resolved).unwrap(), job.uuid);
    }

    assert!(matches!(
        s.manager.resolve("00000000"),
        Err(EngineError::NotFound { .. })
    ));
}
