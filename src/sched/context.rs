// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Saved execution context
//!
//! The register image a context switch restores. This module only builds
//! the record; loading it onto the CPU is the switch primitive's job.

use x86_64::{PhysAddr, VirtAddr};

use crate::mm::KernelStack;

/// Kernel thread entry function
///
/// Receives the two creation arguments. Its return value becomes the
/// thread's exit result.
pub type EntryPoint = extern "C" fn(arg1: i64, arg2: usize) -> usize;

/// Initial RFLAGS for a new kernel thread (IF=1)
pub const INITIAL_RFLAGS: u64 = 0x202;

/// Saved CPU registers and address-space root
///
/// Callee-saved registers of the x86_64 System V ABI, the two argument
/// registers used for the first entry, and the stack the context runs on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    /// First argument register
    pub rdi: u64,
    /// Second argument register
    pub rsi: u64,
    /// Instruction pointer
    pub rip: u64,
    /// Stack pointer
    pub rsp: u64,
    pub rflags: u64,

    /// Root of the address space (CR3 value)
    pub page_directory: PhysAddr,

    /// Lowest usable address of the kernel stack
    pub kstack: VirtAddr,

    /// Usable size of the kernel stack in bytes
    pub kstack_size: usize,
}

impl ExecutionContext {
    /// Create an empty context sized to `stack`
    ///
    /// Registers and address-space root are left zero for the caller to
    /// fill in.
    pub fn empty(stack: &KernelStack) -> Self {
        Self {
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rdi: 0,
            rsi: 0,
            rip: 0,
            rsp: 0,
            rflags: 0,
            page_directory: PhysAddr::zero(),
            kstack: stack.bottom(),
            kstack_size: stack.size(),
        }
    }

    /// Create a context that starts in `entry(arg1, arg2)` on `stack`
    /// inside the address space rooted at `page_directory`
    pub fn setup(
        entry: EntryPoint,
        arg1: i64,
        arg2: usize,
        stack: &KernelStack,
        page_directory: PhysAddr,
    ) -> Self {
        let mut ctx = Self::empty(stack);

        // Align stack to 16 bytes, then leave room for the fake return
        // address the entry function would pop
        let top = stack.top().align_down(16u64);
        ctx.rsp = top.as_u64() - 8;

        ctx.rip = entry as usize as u64;
        ctx.rdi = arg1 as u64;
        ctx.rsi = arg2 as u64;
        ctx.rflags = INITIAL_RFLAGS;
        ctx.page_directory = page_directory;
        ctx
    }

    /// Check whether a register image has been loaded
    pub fn is_populated(&self) -> bool {
        self.rip != 0
    }
}
