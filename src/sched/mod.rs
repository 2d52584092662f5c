// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Threads and Scheduling
//!
//! Thread objects, the thread table, the reference scheduler and the
//! lifecycle manager that ties them together.

pub mod cancel;
pub mod clone;
pub mod context;
pub mod cpu;
pub mod exit;
pub mod kthread;
pub mod scheduler;
pub mod state;
pub mod table;
pub mod thread;

pub use context::{EntryPoint, ExecutionContext};
pub use cpu::Cpu;
pub use kthread::KthreadManager;
pub use scheduler::{Scheduler, SchedulerHooks, SleepResult};
pub use state::{SchedLink, ThreadFlags, ThreadState, WaitChannel};
pub use table::{ThreadSlots, ThreadTable};
pub use thread::{ExitValue, Thread, ThreadId};
