// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Thread Lifecycle
//!
//! [`KthreadManager`] owns the stack allocator and the thread table, and
//! drives a thread from creation to destruction:
//!
//! ```text
//! create ──> Runnable <──> Sleeping / SleepingCancellable
//!               │
//!   exit / cancel(self)
//!               v
//!            Exited ──> destroy (by the process layer)
//!
//! clone ──> Runnable, unlinked ──> attach ──> Runnable, queued
//!                  │
//!                  └──> destroy (fork failed)
//! ```
//!
//! Cancellation, exit and cloning live in their own modules as further
//! `impl` blocks on the manager.

use alloc::sync::Arc;

use super::context::{EntryPoint, ExecutionContext};
use super::scheduler::SchedulerHooks;
use super::state::{SchedLink, ThreadFlags, ThreadState};
use super::table::{ThreadSlots, ThreadTable};
use super::thread::{Thread, ThreadId};
use crate::config::KthreadConfig;
use crate::error::{invariant_violation, Result};
use crate::kassert;
use crate::mm::{KernelStack, ObjectPool, PageAllocator, StackAllocator};
use crate::process::{Process, ProcessLayer};

/// Kernel thread manager
pub struct KthreadManager<A, O, S, L> {
    pub(super) config: KthreadConfig,
    pub(super) stacks: StackAllocator<A>,
    pub(super) threads: ThreadTable<O>,
    pub(super) scheduler: S,
    pub(super) process_layer: L,
}

impl<A, O, S, L> KthreadManager<A, O, S, L>
where
    A: PageAllocator,
    O: ObjectPool,
    S: SchedulerHooks,
    L: ProcessLayer,
{
    /// Create a manager
    ///
    /// Stacks of `config.stack_size` bytes come from `pages`; thread slots
    /// come from `pool`.
    pub fn new(config: KthreadConfig, pages: A, pool: O, scheduler: S, process_layer: L) -> Self {
        let stacks = StackAllocator::new(pages, &config);
        let threads = ThreadTable::new(pool);

        log::info!(
            "kthread: {} byte stacks ({} pages with guard), {} thread slots",
            config.stack_size,
            stacks.extent_pages(),
            threads.capacity()
        );

        Self {
            config,
            stacks,
            threads,
            scheduler,
            process_layer,
        }
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn config(&self) -> &KthreadConfig {
        &self.config
    }

    pub fn stacks(&self) -> &StackAllocator<A> {
        &self.stacks
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn process_layer(&self) -> &L {
        &self.process_layer
    }

    /// Run `f` on a live thread, with the thread table locked
    pub fn with_thread<R>(&self, id: ThreadId, f: impl FnOnce(&mut Thread) -> R) -> Option<R> {
        self.threads.lock().get_mut(id).map(f)
    }

    /// Run `f` with the thread table locked
    ///
    /// Scheduler operations that act on threads run inside this.
    pub fn with_threads<R>(&self, f: impl FnOnce(&mut ThreadSlots) -> R) -> R {
        f(&mut self.threads.lock())
    }

    /// State of a live thread
    pub fn state(&self, id: ThreadId) -> Option<ThreadState> {
        self.with_thread(id, |thread| thread.state())
    }

    /// Check if a handle names a live thread
    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.lock().contains(id)
    }

    /// Number of live threads
    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }

    // ============================================================
    // Create / Destroy
    // ============================================================

    /// Create a kernel thread in `process` that starts in
    /// `entry(arg1, arg2)`
    ///
    /// The new thread is RUNNABLE, a member of `process` and on the run
    /// queue. On failure nothing is left allocated.
    pub fn create(
        &self,
        process: &Arc<Process>,
        entry: EntryPoint,
        arg1: i64,
        arg2: usize,
    ) -> Result<ThreadId> {
        kassert!(
            process.state().accepts_threads(),
            "thread created in process {} in state {:?}",
            process.pid(),
            process.state()
        );

        let (id, stack) = self.allocate()?;
        let context = ExecutionContext::setup(entry, arg1, arg2, &stack, process.page_directory());
        let mut thread = Thread::new(id, stack, context);
        thread.set_process(process);

        let mut threads = self.threads.lock();
        threads.insert(thread);
        process.add_thread(id);
        if let Some(thread) = threads.get_mut(id) {
            self.scheduler.make_runnable(thread);
        }
        drop(threads);

        log::debug!("kthread: created {} in process {}", id, process.pid());
        Ok(id)
    }

    /// Reclaim an EXITED thread, or a clone that was never attached
    ///
    /// Removes it from its process if still a member, then releases its
    /// stack and its slot. The handle is stale afterwards. A fork that
    /// fails after `clone_thread` uses this to give the clone back.
    pub fn destroy(&self, id: ThreadId) {
        let mut threads = self.threads.lock();
        let Some(thread) = threads.get(id) else {
            invariant_violation(format_args!("destroy of stale thread handle {}", id));
        };

        let unattached_clone = thread.state() == ThreadState::Runnable
            && thread.flags().contains(ThreadFlags::CLONED)
            && thread.process_id().is_none();
        kassert!(
            thread.state() == ThreadState::Exited || unattached_clone,
            "destroy of {} in state {:?}",
            id,
            thread.state()
        );
        kassert!(
            thread.sched_link() == SchedLink::Unlinked,
            "destroy of {} still linked to {:?}",
            id,
            thread.sched_link()
        );

        let Some(thread) = self.threads.remove(&mut threads, id) else {
            invariant_violation(format_args!("thread {} vanished during destroy", id));
        };
        drop(threads);

        let (stack, process) = thread.into_parts();
        if let Some(process) = process.as_ref().and_then(|process| process.upgrade()) {
            process.remove_thread(id);
        }
        self.stacks.release_stack(stack);

        log::debug!("kthread: destroyed {}", id);
    }

    /// Attach a clone to `process` and make it runnable
    ///
    /// Completes the setup `clone_thread` leaves to the caller: the clone
    /// joins the process and is queued. Its context should already hold
    /// the register image it is to resume with.
    pub fn attach(&self, id: ThreadId, process: &Arc<Process>) {
        let mut threads = self.threads.lock();
        let Some(thread) = threads.get_mut(id) else {
            invariant_violation(format_args!("attach of stale thread handle {}", id));
        };

        kassert!(
            thread.flags().contains(ThreadFlags::CLONED) && thread.process_id().is_none(),
            "attach of {} which is not an unattached clone",
            id
        );
        kassert!(
            thread.state() == ThreadState::Runnable && thread.sched_link() == SchedLink::Unlinked,
            "attach of {} in {:?}/{:?}",
            id,
            thread.state(),
            thread.sched_link()
        );

        thread.set_process(process);
        thread.context_mut().page_directory = process.page_directory();
        thread.set_flags(thread.flags() - ThreadFlags::CLONED);
        process.add_thread(id);
        self.scheduler.make_runnable(thread);

        log::debug!("kthread: attached {} to process {}", id, process.pid());
    }

    /// Reserve a slot and a stack, undoing the slot if the stack fails
    pub(super) fn allocate(&self) -> Result<(ThreadId, KernelStack)> {
        let id = self
            .threads
            .reserve()
            .inspect_err(|err| log::warn!("kthread: {}", err))?;

        match self.stacks.acquire_stack() {
            Ok(stack) => Ok((id, stack)),
            Err(err) => {
                self.threads.unreserve(id);
                log::warn!("kthread: {}", err);
                Err(err)
            }
        }
    }
}
