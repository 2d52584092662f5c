// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Fixed Object Pool
//!
//! Slot allocator for fixed-size objects. The search for a free slot
//! starts just past the last slot handed out, so freed slots are not
//! reused immediately.

use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use super::ObjectPool;
use crate::kassert;

/// Slot bookkeeping, guarded by the pool lock
struct PoolInner {
    /// Allocation state of each slot
    used: Vec<bool>,

    /// Next slot index to try
    next_index: usize,

    /// Number of allocated slots
    count: usize,
}

/// Fixed-capacity object pool
pub struct FixedObjectPool {
    inner: Mutex<PoolInner>,
}

impl FixedObjectPool {
    /// Create a pool with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                used: vec![false; capacity],
                next_index: 0,
                count: 0,
            }),
        }
    }

    /// Get the number of allocated slots
    pub fn count(&self) -> usize {
        self.inner.lock().count
    }
}

impl ObjectPool for FixedObjectPool {
    fn alloc_object(&self) -> Option<usize> {
        let mut inner = self.inner.lock();
        let capacity = inner.used.len();
        if inner.count >= capacity {
            return None;
        }

        let start = inner.next_index;
        let slot = (0..capacity)
            .map(|offset| (start + offset) % capacity)
            .find(|&idx| !inner.used[idx])?;

        inner.used[slot] = true;
        inner.next_index = (slot + 1) % capacity;
        inner.count += 1;

        Some(slot)
    }

    fn free_object(&self, slot: usize) {
        let mut inner = self.inner.lock();
        kassert!(
            slot < inner.used.len() && inner.used[slot],
            "object pool slot {} freed while not allocated",
            slot
        );

        inner.used[slot] = false;
        inner.count -= 1;
    }

    fn capacity(&self) -> usize {
        self.inner.lock().used.len()
    }
}
