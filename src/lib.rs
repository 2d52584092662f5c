// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! # Rustux Kernel Threads
//!
//! Lifecycle management for kernel threads: creation, destruction,
//! cancellation, exit and the thread half of fork.
//!
//! ## Layout
//!
//! ```text
//! src/
//! ├── config.rs          # Stack and pool sizing
//! ├── error.rs           # Recoverable errors and fatal invariant checks
//! ├── mm/                # Page arena, object pool, kernel stacks
//! ├── process/           # Process membership and the process-layer hook
//! ├── sched/             # Thread objects, scheduler, lifecycle manager
//! └── lib.rs             # This file
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use rustux_kthread::prelude::*;
//!
//! let manager = KthreadManager::new(
//!     KthreadConfig::default(),
//!     PageArena::new(stack_base, stack_pages),
//!     FixedObjectPool::new(MAX_THREADS),
//!     Scheduler::new(),
//!     process_layer,
//! );
//!
//! let tid = manager.create(&process, worker_main, 0, 0)?;
//! manager.cancel(&mut cpu, tid, 0);
//! ```
//!
//! ## Errors
//!
//! Running out of stack pages or thread slots is reported through
//! [`KthreadError`]. Everything else that goes wrong is a broken kernel
//! invariant and halts through [`kassert!`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Fatal invariant checks (macro used by every module below)
pub mod error;

// Sizing constants and runtime configuration
pub mod config;

// Memory seams: page arena, object pool, stacks
pub mod mm;

// Processes as seen by the thread lifecycle
pub mod process;

// Threads and scheduling
pub mod sched;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;

pub use config::KthreadConfig;
pub use error::{KthreadError, Resource, Result};
pub use sched::{Cpu, ExitValue, KthreadManager, ThreadId, ThreadState};

/// Commonly used items
pub mod prelude {
    pub use crate::config::{KthreadConfig, DEFAULT_STACK_SIZE, MAX_THREADS};
    pub use crate::error::{KthreadError, Resource};
    pub use crate::mm::{FixedObjectPool, ObjectPool, PageAllocator, PageArena};
    pub use crate::process::{Process, ProcessLayer, ProcessState};
    pub use crate::sched::{
        Cpu, EntryPoint, ExitValue, KthreadManager, Scheduler, SchedulerHooks, SleepResult,
        ThreadId, ThreadState, WaitChannel,
    };
}
