// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler
//!
//! [`SchedulerHooks`] is the interface the thread lifecycle needs from a
//! scheduler. [`Scheduler`] is a FIFO run queue with wait queues keyed by
//! [`WaitChannel`] that implements it.
//!
//! Every call takes the locked thread table, so a state change and the
//! matching queue update happen in one critical section. A cancellation
//! therefore cannot slip between a sleeper's cancel check and its blocking.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::cpu::Cpu;
use super::state::{SchedLink, ThreadState, WaitChannel};
use super::table::ThreadSlots;
use super::thread::{Thread, ThreadId};
use crate::error::invariant_violation;
use crate::kassert;

/// Scheduler interface used by the thread lifecycle
///
/// Both hooks run with the thread table locked.
pub trait SchedulerHooks {
    /// Place a RUNNABLE thread on a run queue
    fn make_runnable(&self, thread: &mut Thread);

    /// Deliver a cancellation request to `thread`
    ///
    /// `CANCEL_REQUESTED` is already set. A thread in a cancellable sleep
    /// must be woken; any other thread must be left as it is.
    fn cancel(&self, thread: &mut Thread);
}

impl<T: SchedulerHooks + ?Sized> SchedulerHooks for &T {
    fn make_runnable(&self, thread: &mut Thread) {
        (**self).make_runnable(thread)
    }

    fn cancel(&self, thread: &mut Thread) {
        (**self).cancel(thread)
    }
}

/// Outcome of a sleep request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepResult {
    /// The thread is now blocked and the CPU is free
    Blocked,
    /// A cancellation was already pending; the thread keeps running
    Interrupted,
}

/// Run queue and wait queues, guarded by the scheduler lock
#[derive(Debug, Default)]
struct Queues {
    run_queue: VecDeque<ThreadId>,
    wait_queues: BTreeMap<WaitChannel, VecDeque<ThreadId>>,
}

impl Queues {
    fn wait_queue(&mut self, channel: WaitChannel) -> &mut VecDeque<ThreadId> {
        match self.wait_queues.get_mut(&channel) {
            Some(queue) => queue,
            None => invariant_violation(format_args!("unknown wait channel {}", channel)),
        }
    }
}

/// FIFO scheduler
pub struct Scheduler {
    queues: Mutex<Queues>,
    next_channel: AtomicU64,
}

impl Scheduler {
    /// Create a scheduler with empty queues
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            next_channel: AtomicU64::new(1),
        }
    }

    /// Create a wait queue and return its channel
    pub fn create_wait_queue(&self) -> WaitChannel {
        let channel = WaitChannel::new(self.next_channel.fetch_add(1, Ordering::Relaxed));
        self.queues.lock().wait_queues.insert(channel, VecDeque::new());
        channel
    }

    /// Number of threads on the run queue
    pub fn run_queue_len(&self) -> usize {
        self.queues.lock().run_queue.len()
    }

    /// Threads blocked on `channel`, oldest first
    pub fn waiters(&self, channel: WaitChannel) -> Vec<ThreadId> {
        self.queues
            .lock()
            .wait_queues
            .get(&channel)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Run the next thread on `cpu`
    ///
    /// A thread still current on `cpu` is preempted to the back of the run
    /// queue first. Returns the thread now current, if any.
    pub fn dispatch(&self, threads: &mut ThreadSlots, cpu: &mut Cpu) -> Option<ThreadId> {
        self.preempt(threads, cpu);

        let id = self.queues.lock().run_queue.pop_front()?;
        let thread = threads.get_mut(id);
        kassert!(thread.is_some(), "run queue holds stale thread {}", id);
        let thread = thread?;

        thread.link_cpu(cpu.id());
        cpu.set_current(id, thread.process_id());

        log::trace!("cpu{}: dispatched {}", cpu.id(), id);
        Some(id)
    }

    /// Give up the CPU to the next runnable thread
    ///
    /// Unlike [`Scheduler::dispatch`] this requires a current thread.
    /// Returns the thread switched to, or `None` when nothing else is
    /// runnable and the current thread keeps the CPU.
    pub fn yield_current(&self, threads: &mut ThreadSlots, cpu: &mut Cpu) -> Option<ThreadId> {
        let current = Self::current(threads, cpu).id();
        if self.queues.lock().run_queue.is_empty() {
            log::trace!("cpu{}: {} keeps the cpu", cpu.id(), current);
            return None;
        }

        self.dispatch(threads, cpu)
    }

    /// Block the current thread on `channel` until woken
    pub fn sleep_on(&self, threads: &mut ThreadSlots, cpu: &mut Cpu, channel: WaitChannel) {
        let current = Self::current(threads, cpu);
        self.block(current, cpu, channel, false);
    }

    /// Block the current thread on `channel` unless cancellation is pending
    ///
    /// A later [`SchedulerHooks::cancel`] ends the sleep early.
    pub fn cancellable_sleep_on(
        &self,
        threads: &mut ThreadSlots,
        cpu: &mut Cpu,
        channel: WaitChannel,
    ) -> SleepResult {
        let current = Self::current(threads, cpu);
        if current.cancel_requested() {
            log::debug!("{}: cancellable sleep on {} interrupted", current.id(), channel);
            return SleepResult::Interrupted;
        }

        self.block(current, cpu, channel, true);
        SleepResult::Blocked
    }

    /// Wake the oldest thread blocked on `channel`
    pub fn wakeup_on(&self, threads: &mut ThreadSlots, channel: WaitChannel) -> Option<ThreadId> {
        let mut queues = self.queues.lock();
        let id = queues.wait_queue(channel).pop_front()?;
        Self::wake(threads, &mut queues, id);
        Some(id)
    }

    /// Wake every thread blocked on `channel`
    pub fn broadcast_on(&self, threads: &mut ThreadSlots, channel: WaitChannel) -> usize {
        let mut queues = self.queues.lock();
        let woken: Vec<ThreadId> = queues.wait_queue(channel).drain(..).collect();
        for &id in &woken {
            Self::wake(threads, &mut queues, id);
        }
        woken.len()
    }

    fn current<'a>(threads: &'a mut ThreadSlots, cpu: &Cpu) -> &'a mut Thread {
        let Some(id) = cpu.current_thread() else {
            invariant_violation(format_args!("cpu{} has no current thread", cpu.id()));
        };

        match threads.get_mut(id) {
            Some(thread) => thread,
            None => invariant_violation(format_args!(
                "cpu{} runs stale thread {}",
                cpu.id(),
                id
            )),
        }
    }

    fn preempt(&self, threads: &mut ThreadSlots, cpu: &mut Cpu) {
        let Some(id) = cpu.current_thread() else {
            return;
        };

        // An exited thread already left the CPU in its own exit path
        if let Some(thread) = threads.get_mut(id) {
            if thread.sched_link() == SchedLink::OnCpu(cpu.id()) {
                self.make_runnable(thread);
            }
        }
        cpu.clear_current();
    }

    fn block(&self, thread: &mut Thread, cpu: &mut Cpu, channel: WaitChannel, cancellable: bool) {
        let mut queues = self.queues.lock();
        queues.wait_queue(channel).push_back(thread.id());
        thread.block_on(channel, cancellable);
        cpu.clear_current();

        log::trace!("{}: sleeping on {}", thread.id(), channel);
    }

    fn wake(threads: &mut ThreadSlots, queues: &mut Queues, id: ThreadId) {
        let thread = threads.get_mut(id);
        kassert!(thread.is_some(), "wait queue holds stale thread {}", id);
        if let Some(thread) = thread {
            thread.wake();
            queues.run_queue.push_back(id);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerHooks for Scheduler {
    fn make_runnable(&self, thread: &mut Thread) {
        thread.link_run_queue();
        self.queues.lock().run_queue.push_back(thread.id());
    }

    fn cancel(&self, thread: &mut Thread) {
        if thread.state() != ThreadState::SleepingCancellable {
            return;
        }

        let Some(channel) = thread.wait_channel() else {
            return;
        };

        let id = thread.id();
        let mut queues = self.queues.lock();
        queues.wait_queue(channel).retain(|&waiter| waiter != id);
        thread.wake();
        queues.run_queue.push_back(id);

        log::debug!("{}: cancelled out of sleep on {}", id, channel);
    }
}
