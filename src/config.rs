// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel thread configuration
//!
//! Compile-time constants for kernel stacks and the thread pool, plus the
//! runtime [`KthreadConfig`] handed to the subsystem at initialization.

use x86_64::structures::paging::{PageSize, Size4KiB};

use crate::kassert;

/// Page size used by the page-granular allocator (4KB)
pub const PAGE_SIZE: usize = Size4KiB::SIZE as usize;

/// Page size shift for quick division/multiplication
pub const PAGE_SIZE_SHIFT: u32 = 12;

/// Default kernel stack size, excluding the guard page
#[cfg(not(feature = "large_stacks"))]
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Default kernel stack size, excluding the guard page
#[cfg(feature = "large_stacks")]
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Guard pages placed below every kernel stack
pub const STACK_GUARD_PAGES: usize = 1;

/// Default capacity of the reference thread object pool
pub const MAX_THREADS: usize = 1024;

/// Convert bytes to number of pages (rounding up)
#[inline]
pub const fn bytes_to_pages(bytes: usize) -> usize {
    (bytes + PAGE_SIZE - 1) >> PAGE_SIZE_SHIFT
}

/// Convert pages to bytes
#[inline]
pub const fn pages_to_bytes(pages: usize) -> usize {
    pages << PAGE_SIZE_SHIFT
}

/// Runtime configuration of the kernel thread subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KthreadConfig {
    /// Usable kernel stack size in bytes (guard page not included)
    pub stack_size: usize,
}

impl KthreadConfig {
    /// Create a configuration with the given stack size
    pub const fn new(stack_size: usize) -> Self {
        Self { stack_size }
    }

    /// Working pages per kernel stack
    pub const fn stack_pages(&self) -> usize {
        self.stack_size >> PAGE_SIZE_SHIFT
    }

    /// Pages requested from the page allocator per kernel stack
    ///
    /// One guard page plus the working pages.
    pub const fn stack_extent_pages(&self) -> usize {
        STACK_GUARD_PAGES + self.stack_pages()
    }

    /// Halt on a configuration the stack allocator cannot honor
    pub fn validate(&self) {
        kassert!(self.stack_size != 0, "kernel stack size must be non-zero");
        kassert!(
            self.stack_size % PAGE_SIZE == 0,
            "kernel stack size {:#x} is not a multiple of the page size",
            self.stack_size
        );
    }
}

impl Default for KthreadConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_SIZE)
    }
}
