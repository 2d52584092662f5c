// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Page Arena
//!
//! A bitmap page allocator over one virtually contiguous range. It backs
//! kernel stacks when no platform allocator is wired in, and it is what
//! the subsystem's tests allocate from.
//!
//! # Design
//!
//! Each bit in the bitmap represents one page. Allocation is first-fit
//! over contiguous runs of free pages. Every extent handed out is recorded
//! by base address, so a free with the wrong base or the wrong page count
//! is caught instead of silently corrupting the bitmap.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;
use x86_64::VirtAddr;

use super::PageAllocator;
use crate::config::{pages_to_bytes, PAGE_SIZE};
use crate::kassert;

/// Bitmap and extent bookkeeping, guarded by the arena lock
struct ArenaInner {
    /// One bit per page, set when allocated
    bitmap: Vec<u64>,

    /// Live extents: first page index -> page count
    extents: BTreeMap<usize, usize>,

    /// Number of free pages
    free: usize,
}

impl ArenaInner {
    fn is_allocated(&self, page: usize) -> bool {
        self.bitmap[page / 64] & (1u64 << (page % 64)) != 0
    }

    fn mark(&mut self, start: usize, count: usize, allocated: bool) {
        for page in start..start + count {
            let mask = 1u64 << (page % 64);
            if allocated {
                self.bitmap[page / 64] |= mask;
            } else {
                self.bitmap[page / 64] &= !mask;
            }
        }
    }

    /// Find the first run of `count` free pages
    fn find_run(&self, total: usize, count: usize) -> Option<usize> {
        let mut start = 0;

        while start + count <= total {
            match (start..start + count).find(|&page| self.is_allocated(page)) {
                // Skip past the allocated page
                Some(busy) => start = busy + 1,
                None => return Some(start),
            }
        }

        None
    }
}

/// Page-granular allocator over a fixed virtual range
pub struct PageArena {
    /// Base address of the arena (page aligned)
    base: VirtAddr,

    /// Number of pages in the arena
    total: usize,

    inner: Mutex<ArenaInner>,
}

impl PageArena {
    /// Create an arena of `pages` pages starting at `base`
    pub fn new(base: VirtAddr, pages: usize) -> Self {
        kassert!(
            base.is_aligned(PAGE_SIZE as u64),
            "page arena base {:#x} is not page aligned",
            base.as_u64()
        );

        Self {
            base,
            total: pages,
            inner: Mutex::new(ArenaInner {
                bitmap: vec![0; (pages + 63) / 64],
                extents: BTreeMap::new(),
                free: pages,
            }),
        }
    }

    /// Base address of the arena
    pub fn base(&self) -> VirtAddr {
        self.base
    }

    /// Number of pages managed by the arena
    pub fn total_pages(&self) -> usize {
        self.total
    }

    /// Number of pages currently free
    pub fn available_pages(&self) -> usize {
        self.inner.lock().free
    }

    /// Number of live extents
    pub fn extent_count(&self) -> usize {
        self.inner.lock().extents.len()
    }

    fn page_index(&self, addr: VirtAddr) -> Option<usize> {
        let offset = addr.as_u64().checked_sub(self.base.as_u64())?;
        if offset % PAGE_SIZE as u64 != 0 {
            return None;
        }
        let index = (offset / PAGE_SIZE as u64) as usize;
        (index < self.total).then_some(index)
    }
}

impl PageAllocator for PageArena {
    fn alloc_pages(&self, count: usize) -> Option<VirtAddr> {
        if count == 0 {
            return None;
        }

        let mut inner = self.inner.lock();
        if count > inner.free {
            return None;
        }

        let start = inner.find_run(self.total, count)?;
        inner.mark(start, count, true);
        inner.extents.insert(start, count);
        inner.free -= count;

        let addr = self.base + pages_to_bytes(start) as u64;
        log::trace!("page arena: allocated {} pages at {:#x}", count, addr.as_u64());
        Some(addr)
    }

    fn free_pages(&self, base: VirtAddr, count: usize) {
        let index = self.page_index(base);
        kassert!(
            index.is_some(),
            "free of {:#x} outside the page arena",
            base.as_u64()
        );
        let start = index.unwrap_or_default();

        let mut inner = self.inner.lock();
        let recorded = inner.extents.get(&start).copied();
        kassert!(
            recorded.is_some(),
            "free of {:#x} which is not the base of a live extent",
            base.as_u64()
        );
        kassert!(
            recorded == Some(count),
            "free of {:#x} with {} pages, extent has {:?}",
            base.as_u64(),
            count,
            recorded
        );

        inner.extents.remove(&start);
        inner.mark(start, count, false);
        inner.free += count;

        log::trace!("page arena: freed {} pages at {:#x}", count, base.as_u64());
    }
}
