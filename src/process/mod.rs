// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Process Management
//!
//! The slice of a process the kernel thread lifecycle depends on: its
//! identity, its address-space root and its collection of member threads.
//! Process teardown and reaping belong to the process layer, reached
//! through [`ProcessLayer`].
//!
//! # Process States
//!
//! ```text
//! Creating -> Running -> Exiting -> Dead
//! ```

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;
use x86_64::PhysAddr;

use crate::kassert;
use crate::sched::{Cpu, ExitValue, ThreadId};

/// ============================================================================
/// Process ID
/// ============================================================================

/// Process ID type
pub type ProcessId = u64;

/// First process ID handed out by [`Process::new`]
pub const PID_FIRST: ProcessId = 1;

/// Global process ID allocator
static PID_ALLOCATOR: PidAllocator = PidAllocator::new();

/// Process ID allocator
struct PidAllocator {
    next: AtomicU64,
}

impl PidAllocator {
    const fn new() -> Self {
        Self {
            next: AtomicU64::new(PID_FIRST),
        }
    }

    fn allocate(&self) -> ProcessId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// ============================================================================
/// Process State
/// ============================================================================

/// Process state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Process is being created
    Creating = 0,

    /// Process is running (has at least one thread)
    Running = 1,

    /// Process is exiting (threads terminating)
    Exiting = 2,

    /// Process is dead (all threads terminated, resources freed)
    Dead = 3,
}

impl ProcessState {
    /// Check if new threads may join the process
    ///
    /// An exiting process is tearing its threads down and takes no more.
    pub const fn accepts_threads(self) -> bool {
        matches!(self, Self::Creating | Self::Running)
    }
}

/// ============================================================================
/// Process
/// ============================================================================

/// Process
#[derive(Debug)]
pub struct Process {
    /// Process ID
    pid: ProcessId,

    /// Root of the address space (loaded into CR3)
    page_directory: PhysAddr,

    /// Process state
    state: Mutex<ProcessState>,

    /// Member threads
    threads: Mutex<Vec<ThreadId>>,

    /// Process name (for debugging)
    name: Mutex<Option<&'static str>>,
}

impl Process {
    /// Create a process whose address space is rooted at `page_directory`
    pub fn new(page_directory: PhysAddr) -> Arc<Self> {
        Arc::new(Self {
            pid: PID_ALLOCATOR.allocate(),
            page_directory,
            state: Mutex::new(ProcessState::Creating),
            threads: Mutex::new(Vec::new()),
            name: Mutex::new(None),
        })
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn page_directory(&self) -> PhysAddr {
        self.page_directory
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub fn set_state(&self, new_state: ProcessState) {
        *self.state.lock() = new_state;
    }

    /// Add a member thread
    ///
    /// Fatal if the thread is already a member.
    pub fn add_thread(&self, tid: ThreadId) {
        let mut threads = self.threads.lock();
        kassert!(
            !threads.contains(&tid),
            "thread {} added to process {} twice",
            tid,
            self.pid
        );

        threads.push(tid);
    }

    /// Remove a member thread
    ///
    /// Returns false if the thread was not a member.
    pub fn remove_thread(&self, tid: ThreadId) -> bool {
        let mut threads = self.threads.lock();
        match threads.iter().position(|&t| t == tid) {
            Some(pos) => {
                threads.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains_thread(&self, tid: ThreadId) -> bool {
        self.threads.lock().contains(&tid)
    }

    /// Snapshot of the member threads
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().clone()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn set_name(&self, name: &'static str) {
        *self.name.lock() = Some(name);
    }

    pub fn name(&self) -> Option<&'static str> {
        *self.name.lock()
    }
}

/// ============================================================================
/// Process Layer
/// ============================================================================

/// Process-layer hook invoked when a kernel thread exits
pub trait ProcessLayer {
    /// Take over an exited thread
    ///
    /// `thread` was current on `cpu`, is now EXITED and holds `result` as
    /// its pending result. The implementation must switch `cpu` to other
    /// work and never return to the exited thread.
    fn thread_exited(&self, cpu: &mut Cpu, thread: ThreadId, result: ExitValue) -> !;
}

impl<T: ProcessLayer + ?Sized> ProcessLayer for &T {
    fn thread_exited(&self, cpu: &mut Cpu, thread: ThreadId, result: ExitValue) -> ! {
        (**self).thread_exited(cpu, thread, result)
    }
}
