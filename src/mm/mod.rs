// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Memory seams for the kernel thread subsystem
//!
//! Threads need two kinds of memory: page-granular extents for kernel
//! stacks and fixed-size slots for thread objects. The kernel's real
//! allocators sit behind the [`PageAllocator`] and [`ObjectPool`] traits;
//! this module also ships simple reference implementations of both.
//!
//! # Layers
//!
//! ```text
//! StackAllocator  ──> PageAllocator (PageArena, or the kernel PMM)
//! ThreadTable     ──> ObjectPool    (FixedObjectPool, or a slab cache)
//! ```

pub mod page;
pub mod slab;
pub mod stack;

use x86_64::VirtAddr;

pub use page::PageArena;
pub use slab::FixedObjectPool;
pub use stack::{KernelStack, StackAllocator};

/// Page-granular allocator
///
/// Extents are tracked by base address and length, so every free must
/// pass back exactly the page count used at allocation.
pub trait PageAllocator {
    /// Allocate `count` contiguous pages
    ///
    /// Returns the base of the extent, or `None` when memory is exhausted.
    fn alloc_pages(&self, count: usize) -> Option<VirtAddr>;

    /// Free an extent returned by [`alloc_pages`](Self::alloc_pages)
    fn free_pages(&self, base: VirtAddr, count: usize);
}

/// Fixed-size object pool
///
/// Hands out slot indices into storage of identically sized objects.
pub trait ObjectPool {
    /// Allocate a free slot, or `None` when the pool is exhausted
    fn alloc_object(&self) -> Option<usize>;

    /// Return a slot to the pool
    fn free_object(&self, slot: usize);

    /// Total number of slots the pool can hand out
    fn capacity(&self) -> usize;
}

impl<T: PageAllocator + ?Sized> PageAllocator for &T {
    fn alloc_pages(&self, count: usize) -> Option<VirtAddr> {
        (**self).alloc_pages(count)
    }

    fn free_pages(&self, base: VirtAddr, count: usize) {
        (**self).free_pages(base, count)
    }
}

impl<T: ObjectPool + ?Sized> ObjectPool for &T {
    fn alloc_object(&self) -> Option<usize> {
        (**self).alloc_object()
    }

    fn free_object(&self, slot: usize) {
        (**self).free_object(slot)
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}
