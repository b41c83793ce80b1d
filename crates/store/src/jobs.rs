// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed registry of job records.

use crate::error::StoreError;
use crate::guard::CloseGuard;
use jl_core::Job;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Concurrency-safe job registry. Reads return deep copies.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    guard: CloseGuard,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job. Fails when the uuid is already present.
    pub fn create(&self, job: Job) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.uuid) {
            return Err(StoreError::already_exists("job", &job.uuid));
        }
        jobs.insert(job.uuid.clone(), job);
        Ok(())
    }

    pub fn get(&self, uuid: &str) -> Result<Job, StoreError> {
        let _open = self.guard.enter()?;
        self.jobs
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("job", uuid))
    }

    /// Replace the stored record for an existing job.
    pub fn update(&self, job: Job) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let mut jobs = self.jobs.write();
        match jobs.get_mut(&job.uuid) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(StoreError::not_found("job", &job.uuid)),
        }
    }

    /// Snapshot of every job, in unspecified order.
    pub fn list(&self) -> Result<Vec<Job>, StoreError> {
        let _open = self.guard.enter()?;
        Ok(self.jobs.read().values().cloned().collect())
    }

    pub fn delete(&self, uuid: &str) -> Result<Job, StoreError> {
        let _open = self.guard.enter()?;
        self.jobs
            .write()
            .remove(uuid)
            .ok_or_else(|| StoreError::not_found("job", uuid))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn close(&self) {
        self.guard.close();
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
