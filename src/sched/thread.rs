// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Thread Object
//!
//! A thread owns exactly one kernel stack and one execution context for
//! its whole lifetime. State changes go through the transition methods
//! below, which refuse anything the lifecycle does not allow.

use alloc::sync::{Arc, Weak};
use core::fmt;

use super::context::ExecutionContext;
use super::state::{SchedLink, ThreadFlags, ThreadState, WaitChannel};
use crate::kassert;
use crate::mm::KernelStack;
use crate::process::{Process, ProcessId};

/// Exit result of a kernel thread
///
/// Opaque to this subsystem; the process layer interprets it.
pub type ExitValue = usize;

/// Thread handle
///
/// Names a slot in the thread table plus the generation of the slot's
/// current occupant. A handle outlives its thread harmlessly: once the
/// thread is destroyed the generation no longer matches and lookups miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId {
    slot: u32,
    generation: u32,
}

impl ThreadId {
    pub(crate) const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Table slot of the thread
    pub const fn slot(self) -> usize {
        self.slot as usize
    }

    /// Generation of the slot when the thread was created
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kt{}.{}", self.slot, self.generation)
    }
}

/// Kernel thread
#[derive(Debug)]
pub struct Thread {
    /// Thread handle
    id: ThreadId,

    /// Current state
    state: ThreadState,

    /// Scheduling structure the thread is linked into
    link: SchedLink,

    /// Bookkeeping flags
    flags: ThreadFlags,

    /// Result reported at exit (or requested by cancel)
    pending_result: Option<ExitValue>,

    /// Last error code set by kernel code running on this thread
    errno: i32,

    /// Owning process (unset for a clone awaiting attach)
    process: Option<Weak<Process>>,

    /// Owning process ID, cached for the exit-time identity check
    pid: Option<ProcessId>,

    /// Kernel stack
    stack: KernelStack,

    /// Saved register image
    context: ExecutionContext,
}

impl Thread {
    /// Create a RUNNABLE, unlinked thread with cleared bookkeeping
    pub(crate) fn new(id: ThreadId, stack: KernelStack, context: ExecutionContext) -> Self {
        Self {
            id,
            state: ThreadState::Runnable,
            link: SchedLink::Unlinked,
            flags: ThreadFlags::empty(),
            pending_result: None,
            errno: 0,
            process: None,
            pid: None,
            stack,
            context,
        }
    }

    /// Consume the thread, giving back its stack and owning process
    pub(crate) fn into_parts(self) -> (KernelStack, Option<Weak<Process>>) {
        (self.stack, self.process)
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn sched_link(&self) -> SchedLink {
        self.link
    }

    pub fn flags(&self) -> ThreadFlags {
        self.flags
    }

    pub fn pending_result(&self) -> Option<ExitValue> {
        self.pending_result
    }

    /// Check if another thread has asked this one to terminate
    pub fn cancel_requested(&self) -> bool {
        self.flags.contains(ThreadFlags::CANCEL_REQUESTED)
    }

    /// Wait channel the thread is blocked on, derived from its link
    pub fn wait_channel(&self) -> Option<WaitChannel> {
        self.link.wait_channel()
    }

    pub fn errno(&self) -> i32 {
        self.errno
    }

    pub fn set_errno(&mut self, errno: i32) {
        self.errno = errno;
    }

    /// Owning process, if set and still alive
    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.as_ref().and_then(Weak::upgrade)
    }

    pub fn process_id(&self) -> Option<ProcessId> {
        self.pid
    }

    /// Check if the owning process lists this thread as a member
    pub fn is_process_member(&self) -> bool {
        self.process()
            .is_some_and(|process| process.contains_thread(self.id))
    }

    pub fn stack(&self) -> &KernelStack {
        &self.stack
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Mutable context, for the fork path to load a register image
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    // ============================================================
    // Scheduler transitions
    // ============================================================

    /// Place the thread on the run queue
    ///
    /// Valid for a runnable thread that is unlinked (new, or awaiting
    /// attach) or leaving its CPU. An exited thread is never made runnable
    /// again.
    pub fn link_run_queue(&mut self) {
        kassert!(
            self.state == ThreadState::Runnable,
            "thread {} made runnable from {:?}",
            self.id,
            self.state
        );
        kassert!(
            matches!(self.link, SchedLink::Unlinked | SchedLink::OnCpu(_)),
            "thread {} made runnable while linked to {:?}",
            self.id,
            self.link
        );

        self.link = SchedLink::RunQueue;
    }

    /// Move the thread from the run queue onto CPU `cpu`
    pub fn link_cpu(&mut self, cpu: u32) {
        kassert!(
            self.state == ThreadState::Runnable && self.link == SchedLink::RunQueue,
            "thread {} dispatched from {:?}/{:?}",
            self.id,
            self.state,
            self.link
        );

        self.link = SchedLink::OnCpu(cpu);
    }

    /// Block the running thread on `channel`
    pub fn block_on(&mut self, channel: WaitChannel, cancellable: bool) {
        kassert!(
            self.state == ThreadState::Runnable && matches!(self.link, SchedLink::OnCpu(_)),
            "thread {} blocked from {:?}/{:?}",
            self.id,
            self.state,
            self.link
        );

        self.state = if cancellable {
            ThreadState::SleepingCancellable
        } else {
            ThreadState::Sleeping
        };
        self.link = SchedLink::WaitQueue(channel);
    }

    /// Wake a sleeping thread onto the run queue
    ///
    /// The caller must queue the thread in the same critical section.
    pub fn wake(&mut self) {
        kassert!(
            self.state.is_sleeping(),
            "thread {} woken from {:?}",
            self.id,
            self.state
        );

        self.state = ThreadState::Runnable;
        self.link = SchedLink::RunQueue;
    }

    // ============================================================
    // Lifecycle transitions
    // ============================================================

    pub(crate) fn set_process(&mut self, process: &Arc<Process>) {
        self.process = Some(Arc::downgrade(process));
        self.pid = Some(process.pid());
    }

    pub(crate) fn set_flags(&mut self, flags: ThreadFlags) {
        self.flags = flags;
    }

    pub(crate) fn set_pending_result(&mut self, result: Option<ExitValue>) {
        self.pending_result = result;
    }

    /// Record a cancellation request
    pub(crate) fn request_cancel(&mut self, result: ExitValue) {
        self.pending_result = Some(result);
        self.flags.insert(ThreadFlags::CANCEL_REQUESTED);
    }

    /// Terminate the thread running on CPU `cpu`
    pub(crate) fn mark_exited(&mut self, result: ExitValue) {
        kassert!(
            !self.state.is_exited(),
            "thread {} exited twice",
            self.id
        );

        self.pending_result = Some(result);
        self.state = ThreadState::Exited;
        self.link = SchedLink::Unlinked;
    }

    /// Check the structural invariants of the thread
    ///
    /// Fatal if the link disagrees with the state.
    pub fn assert_invariants(&self) {
        let consistent = match self.state {
            // A runnable thread is unlinked only while a clone awaits attach
            ThreadState::Runnable => match self.link {
                SchedLink::RunQueue | SchedLink::OnCpu(_) => true,
                SchedLink::Unlinked => self.flags.contains(ThreadFlags::CLONED),
                SchedLink::WaitQueue(_) => false,
            },
            ThreadState::Sleeping | ThreadState::SleepingCancellable => {
                self.link.wait_channel().is_some()
            }
            ThreadState::Exited => self.link == SchedLink::Unlinked,
        };

        kassert!(
            consistent,
            "thread {} is {:?} while linked to {:?}",
            self.id,
            self.state,
            self.link
        );
    }
}
