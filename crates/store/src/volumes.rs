// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed registry of volumes with job reference counting.

use crate::error::StoreError;
use crate::guard::CloseGuard;
use jl_core::Volume;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Concurrency-safe volume registry.
///
/// `job_count` is mutated only through [`VolumeStore::increment_ref`] and
/// [`VolumeStore::decrement_ref`], keeping it non-negative; removal is
/// gated on the count being zero.
#[derive(Default)]
pub struct VolumeStore {
    volumes: RwLock<HashMap<String, Volume>>,
    guard: CloseGuard,
}

impl VolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, volume: Volume) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let mut volumes = self.volumes.write();
        if volumes.contains_key(&volume.name) {
            return Err(StoreError::already_exists("volume", &volume.name));
        }
        volumes.insert(volume.name.clone(), volume);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Volume, StoreError> {
        let _open = self.guard.enter()?;
        self.volumes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("volume", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.volumes.read().contains_key(name)
    }

    pub fn list(&self) -> Result<Vec<Volume>, StoreError> {
        let _open = self.guard.enter()?;
        Ok(self.volumes.read().values().cloned().collect())
    }

    /// Replace a volume's record. The live reference count is preserved;
    /// it only moves through the increment/decrement entry points.
    pub fn update(&self, volume: Volume) -> Result<(), StoreError> {
        let _open = self.guard.enter()?;
        let mut volumes = self.volumes.write();
        match volumes.get_mut(&volume.name) {
            Some(slot) => {
                let job_count = slot.job_count;
                *slot = volume;
                slot.job_count = job_count;
                Ok(())
            }
            None => Err(StoreError::not_found("volume", &volume.name)),
        }
    }

    /// Remove a volume; refused while jobs reference it.
    pub fn remove(&self, name: &str) -> Result<Volume, StoreError> {
        let _open = self.guard.enter()?;
        let mut volumes = self.volumes.write();
        match volumes.get(name) {
            Some(volume) if volume.job_count > 0 => Err(StoreError::VolumeInUse {
                name: name.to_string(),
                count: volume.job_count,
            }),
            Some(_) => {
                volumes.remove(name).ok_or_else(|| StoreError::not_found("volume", name))
            }
            None => Err(StoreError::not_found("volume", name)),
        }
    }

    /// Record one more job using this volume.
    pub fn increment_ref(&self, name: &str) -> Result<u32, StoreError> {
        let _open = self.guard.enter()?;
        let mut volumes = self.volumes.write();
        let volume = volumes
            .get_mut(name)
            .ok_or_else(|| StoreError::not_found("volume", name))?;
        volume.job_count += 1;
        Ok(volume.job_count)
    }

    /// Record one fewer job using this volume. Saturates at zero.
    pub fn decrement_ref(&self, name: &str) -> Result<u32, StoreError> {
        let _open = self.guard.enter()?;
        let mut volumes = self.volumes.write();
        let volume = volumes
            .get_mut(name)
            .ok_or_else(|| StoreError::not_found("volume", name))?;
        if volume.job_count == 0 {
            tracing::warn!(volume = name, "decrement_ref on unreferenced volume");
        } else {
            volume.job_count -= 1;
        }
        Ok(volume.job_count)
    }

    pub fn close(&self) {
        self.guard.close();
    }
}

#[cfg(test)]
#[path = "volumes_tests.rs"]
mod tests;
