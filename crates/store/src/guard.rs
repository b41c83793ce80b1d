// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Close guard shared by the stores.
//!
//! A reader/writer lock over a boolean: public operations hold the read
//! side for their duration and refuse once `close()` has flipped the flag,
//! so `close()` also waits out any operation already in flight.

use crate::error::StoreError;
use parking_lot::{RwLock, RwLockReadGuard};

#[derive(Default)]
pub(crate) struct CloseGuard {
    closed: RwLock<bool>,
}

impl CloseGuard {
    /// Enter a public operation. Err when the store is closed.
    pub(crate) fn enter(&self) -> Result<RwLockReadGuard<'_, bool>, StoreError> {
        let guard = self.closed.read();
        if *guard {
            return Err(StoreError::Closed);
        }
        Ok(guard)
    }

    /// Mark closed. Idempotent.
    pub(crate) fn close(&self) {
        *self.closed.write() = true;
    }
}
