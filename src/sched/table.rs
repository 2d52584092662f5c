// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Table
//!
//! Stores thread objects in slots handed out by an [`ObjectPool`]. Each
//! slot carries a generation counter that is bumped whenever a thread is
//! placed in it, so a handle to a destroyed thread never aliases the
//! slot's next occupant.

use alloc::vec::Vec;

use spin::{Mutex, MutexGuard};

use super::thread::{Thread, ThreadId};
use crate::error::{KthreadError, Resource, Result};
use crate::kassert;
use crate::mm::ObjectPool;

/// One table slot
#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    thread: Option<Thread>,
}

/// Thread storage, reached through [`ThreadTable::lock`]
#[derive(Debug)]
pub struct ThreadSlots {
    slots: Vec<Slot>,
}

impl ThreadSlots {
    fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        Self { slots }
    }

    /// Look up a live thread
    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.thread.as_ref())
    }

    /// Look up a live thread for modification
    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.thread.as_mut())
    }

    /// Check if a handle names a live thread
    pub fn contains(&self, id: ThreadId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live threads
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.thread.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live threads
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.slots.iter().filter_map(|slot| slot.thread.as_ref())
    }

    /// Issue the handle for the next occupant of `slot`
    fn next_id(&mut self, slot: usize) -> ThreadId {
        let entry = &mut self.slots[slot];
        kassert!(entry.thread.is_none(), "thread slot {} is occupied", slot);

        entry.generation = entry.generation.wrapping_add(1);
        ThreadId::new(slot as u32, entry.generation)
    }

    /// Place `thread` in the slot its handle names
    pub(crate) fn insert(&mut self, thread: Thread) {
        let id = thread.id();
        let entry = &mut self.slots[id.slot()];
        kassert!(
            entry.generation == id.generation() && entry.thread.is_none(),
            "thread {} inserted into a reissued slot",
            id
        );

        entry.thread = Some(thread);
    }

    /// Take a live thread out of the table
    fn remove(&mut self, id: ThreadId) -> Option<Thread> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.thread.take())
    }
}

/// Thread object pool adapter
pub struct ThreadTable<O> {
    pool: O,
    slots: Mutex<ThreadSlots>,
}

impl<O: ObjectPool> ThreadTable<O> {
    /// Create a table backed by `pool`
    pub fn new(pool: O) -> Self {
        let capacity = pool.capacity();
        Self {
            pool,
            slots: Mutex::new(ThreadSlots::with_capacity(capacity)),
        }
    }

    /// Lock the table
    ///
    /// Every thread state change happens under this lock.
    pub fn lock(&self) -> MutexGuard<'_, ThreadSlots> {
        self.slots.lock()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Reserve a slot and issue the handle for its next occupant
    pub(crate) fn reserve(&self) -> Result<ThreadId> {
        let slot = self
            .pool
            .alloc_object()
            .ok_or(KthreadError::AllocationFailure(Resource::ThreadObject))?;

        kassert!(
            slot < self.capacity(),
            "object pool returned slot {} beyond capacity {}",
            slot,
            self.capacity()
        );

        Ok(self.lock().next_id(slot))
    }

    /// Give back a reserved slot that never received a thread
    pub(crate) fn unreserve(&self, id: ThreadId) {
        self.pool.free_object(id.slot());
    }

    /// Take a thread out and release its slot
    pub(crate) fn remove(&self, slots: &mut ThreadSlots, id: ThreadId) -> Option<Thread> {
        let thread = slots.remove(id)?;
        self.pool.free_object(id.slot());
        Some(thread)
    }
}
