// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel stacks
//!
//! Every kernel thread runs on its own stack: one guard page at the low end
//! of the extent, followed by the working pages.
//!
//! ```text
//! base                 bottom                               top
//!  |  guard page(s)  |  working pages (grow down from top)  |
//! ```
//!
//! A [`KernelStack`] is neither `Clone` nor `Copy`: the only way to give the
//! pages back is to move the handle into [`StackAllocator::release_stack`],
//! so a stack is released at most once.

use x86_64::VirtAddr;

use super::PageAllocator;
use crate::config::{pages_to_bytes, KthreadConfig, STACK_GUARD_PAGES};
use crate::error::{KthreadError, Resource, Result};
use crate::kassert;

/// Exclusively owned kernel stack region
#[derive(Debug, PartialEq, Eq)]
pub struct KernelStack {
    /// Base of the extent (start of the guard page)
    base: VirtAddr,

    /// Pages in the extent, guard included
    pages: usize,
}

impl KernelStack {
    /// Base of the whole extent, where the guard page starts
    pub fn base(&self) -> VirtAddr {
        self.base
    }

    /// Lowest usable address, just above the guard page
    pub fn bottom(&self) -> VirtAddr {
        self.base + pages_to_bytes(STACK_GUARD_PAGES) as u64
    }

    /// Get the top of the stack (stack grows down)
    pub fn top(&self) -> VirtAddr {
        self.base + pages_to_bytes(self.pages) as u64
    }

    /// Usable stack size in bytes
    pub fn size(&self) -> usize {
        pages_to_bytes(self.pages - STACK_GUARD_PAGES)
    }

    /// Pages in the extent, guard included
    pub fn extent_pages(&self) -> usize {
        self.pages
    }

    /// Check whether `addr` falls inside the guard page
    pub fn in_guard(&self, addr: VirtAddr) -> bool {
        addr >= self.base && addr < self.bottom()
    }

    /// Check whether two stacks share any page
    pub fn overlaps(&self, other: &KernelStack) -> bool {
        self.base < other.top() && other.base < self.top()
    }
}

/// Stack allocator adapter over a page-granular allocator
pub struct StackAllocator<A> {
    pages: A,

    /// Pages requested per stack (guard + working)
    extent_pages: usize,
}

impl<A: PageAllocator> StackAllocator<A> {
    /// Create an adapter handing out stacks of `config.stack_size` bytes
    pub fn new(pages: A, config: &KthreadConfig) -> Self {
        config.validate();
        Self {
            pages,
            extent_pages: config.stack_extent_pages(),
        }
    }

    /// Pages requested per stack, guard included
    pub fn extent_pages(&self) -> usize {
        self.extent_pages
    }

    /// Get the underlying page allocator
    pub fn page_allocator(&self) -> &A {
        &self.pages
    }

    /// Allocate a new kernel stack
    pub fn acquire_stack(&self) -> Result<KernelStack> {
        let base = self
            .pages
            .alloc_pages(self.extent_pages)
            .ok_or(KthreadError::AllocationFailure(Resource::KernelStack))?;

        Ok(KernelStack {
            base,
            pages: self.extent_pages,
        })
    }

    /// Free a stack allocated with [`acquire_stack`](Self::acquire_stack)
    pub fn release_stack(&self, stack: KernelStack) {
        kassert!(
            stack.pages == self.extent_pages,
            "kernel stack at {:#x} has {} pages, allocator hands out {}",
            stack.base.as_u64(),
            stack.pages,
            self.extent_pages
        );

        self.pages.free_pages(stack.base, stack.pages);
    }
}
