// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Testing infrastructure for the thread lifecycle
//!
//! A [`Fixture`] wires the manager to the reference page arena, object
//! pool and scheduler, with one running process and one CPU.
//!
//! The exit handoff never returns. [`UnwindingProcessLayer`] models the
//! switch away from the exited thread by unwinding with a [`Handoff`]
//! payload, which [`expect_handoff`] catches.
//!
//! # Usage
//! ```ignore
//! let mut fx = Fixture::new();
//! let tid = fx.spawn();
//! assert_eq!(fx.run_next(), Some(tid));
//!
//! let handoff = fx.exit_current(99);
//! assert_eq!(handoff.thread, tid);
//! ```

use std::panic::{catch_unwind, panic_any, AssertUnwindSafe};
use std::sync::Arc;

use spin::Mutex;
use x86_64::{PhysAddr, VirtAddr};

use crate::config::{KthreadConfig, PAGE_SIZE};
use crate::mm::{FixedObjectPool, PageArena};
use crate::process::{Process, ProcessLayer, ProcessState};
use crate::sched::{Cpu, ExitValue, KthreadManager, Scheduler, SleepResult, ThreadId, WaitChannel};

/// Base of the stack arena used by every fixture
pub const ARENA_BASE: u64 = 0xffff_8000_1000_0000;

/// Address-space root of the fixture process
pub const PAGE_DIRECTORY: u64 = 0x0010_0000;

/// Usable stack size of fixture threads
pub const STACK_SIZE: usize = 2 * PAGE_SIZE;

/// Control transfer out of an exited thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    pub cpu: u32,
    pub thread: ThreadId,
    pub result: ExitValue,
}

/// Process layer that records each exit and unwinds to the test
#[derive(Default)]
pub struct UnwindingProcessLayer {
    exited: Mutex<Vec<Handoff>>,
}

impl UnwindingProcessLayer {
    /// Every handoff received so far, oldest first
    pub fn exited(&self) -> Vec<Handoff> {
        self.exited.lock().clone()
    }
}

impl ProcessLayer for UnwindingProcessLayer {
    fn thread_exited(&self, cpu: &mut Cpu, thread: ThreadId, result: ExitValue) -> ! {
        let handoff = Handoff {
            cpu: cpu.id(),
            thread,
            result,
        };
        self.exited.lock().push(handoff);
        cpu.clear_current();
        panic_any(handoff)
    }
}

/// Run `f`, which must leave through the exit handoff
pub fn expect_handoff(f: impl FnOnce()) -> Handoff {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("exit handoff returned to its caller"),
        Err(payload) => match payload.downcast::<Handoff>() {
            Ok(handoff) => *handoff,
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

/// Entry function for fixture threads
pub extern "C" fn worker(arg1: i64, arg2: usize) -> usize {
    (arg1 as usize).wrapping_add(arg2)
}

pub type TestManager =
    KthreadManager<&'static PageArena, &'static FixedObjectPool, Scheduler, UnwindingProcessLayer>;

/// Manager, process and CPU for one test
pub struct Fixture {
    pub manager: TestManager,
    pub pages: &'static PageArena,
    pub pool: &'static FixedObjectPool,
    pub process: Arc<Process>,
    pub cpu: Cpu,
}

impl Fixture {
    /// Room for 16 stacks and 16 thread slots
    pub fn new() -> Self {
        Self::with_limits(16, 16)
    }

    /// Room for `stacks` stacks and `slots` thread slots
    pub fn with_limits(stacks: usize, slots: usize) -> Self {
        let config = KthreadConfig::new(STACK_SIZE);

        // Leaked so the manager can borrow them for the whole test
        let pages: &'static PageArena = Box::leak(Box::new(PageArena::new(
            VirtAddr::new(ARENA_BASE),
            stacks * config.stack_extent_pages(),
        )));
        let pool: &'static FixedObjectPool = Box::leak(Box::new(FixedObjectPool::new(slots)));

        let manager = KthreadManager::new(
            config,
            pages,
            pool,
            Scheduler::new(),
            UnwindingProcessLayer::default(),
        );

        Self {
            manager,
            pages,
            pool,
            process: Self::running_process(),
            cpu: Cpu::new(0),
        }
    }

    /// A fresh process in the `Running` state
    pub fn running_process() -> Arc<Process> {
        let process = Process::new(PhysAddr::new(PAGE_DIRECTORY));
        process.set_state(ProcessState::Running);
        process
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.manager.scheduler()
    }

    /// Create a thread in the fixture process
    pub fn spawn(&self) -> ThreadId {
        self.manager
            .create(&self.process, worker, 1, 2)
            .expect("create failed")
    }

    /// Dispatch the head of the run queue onto the fixture CPU
    pub fn run_next(&mut self) -> Option<ThreadId> {
        let cpu = &mut self.cpu;
        let manager = &self.manager;
        manager.with_threads(|threads| manager.scheduler().dispatch(threads, cpu))
    }

    /// Dispatch until `id` is current
    pub fn run(&mut self, id: ThreadId) {
        for _ in 0..=self.manager.thread_count() {
            if self.run_next() == Some(id) {
                return;
            }
        }
        panic!("{} never reached the cpu", id);
    }

    /// Block the current thread on `channel`
    pub fn sleep_current(&mut self, channel: WaitChannel, cancellable: bool) -> SleepResult {
        let cpu = &mut self.cpu;
        let manager = &self.manager;
        manager.with_threads(|threads| {
            if cancellable {
                manager.scheduler().cancellable_sleep_on(threads, cpu, channel)
            } else {
                manager.scheduler().sleep_on(threads, cpu, channel);
                SleepResult::Blocked
            }
        })
    }

    /// Run `id` and put it to sleep on a fresh wait queue
    pub fn park(&mut self, id: ThreadId, cancellable: bool) -> WaitChannel {
        let channel = self.scheduler().create_wait_queue();
        self.run(id);
        assert_eq!(self.sleep_current(channel, cancellable), SleepResult::Blocked);
        channel
    }

    /// Wake the oldest sleeper on `channel`
    pub fn wakeup(&self, channel: WaitChannel) -> Option<ThreadId> {
        let manager = &self.manager;
        manager.with_threads(|threads| manager.scheduler().wakeup_on(threads, channel))
    }

    /// Exit the current thread, returning the handoff
    pub fn exit_current(&mut self, result: ExitValue) -> Handoff {
        let manager = &self.manager;
        let cpu = &mut self.cpu;
        expect_handoff(|| manager.exit(cpu, result))
    }

    /// Cancel `target` from the fixture CPU
    pub fn cancel(&mut self, target: ThreadId, result: ExitValue) {
        self.manager.cancel(&mut self.cpu, target, result);
    }

    /// Check the state/link invariants of every live thread
    pub fn check_invariants(&self) {
        self.manager.with_threads(|threads| {
            for thread in threads.iter() {
                thread.assert_invariants();
            }
        });
    }
}
