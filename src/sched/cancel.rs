// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread cancellation
//!
//! Cancelling another thread is advisory: it records the result and sets
//! `CANCEL_REQUESTED`, and the scheduler ends a cancellable sleep early.
//! The target exits on its own once it observes the request. Cancelling
//! the current thread is an immediate exit.

use super::cpu::Cpu;
use super::kthread::KthreadManager;
use super::scheduler::SchedulerHooks;
use super::thread::{ExitValue, ThreadId};
use crate::mm::{ObjectPool, PageAllocator};
use crate::process::ProcessLayer;

impl<A, O, S, L> KthreadManager<A, O, S, L>
where
    A: PageAllocator,
    O: ObjectPool,
    S: SchedulerHooks,
    L: ProcessLayer,
{
    /// Ask `target` to terminate with `result`
    ///
    /// If `target` is current on `cpu` this is [`exit`](Self::exit) and
    /// does not return. A stale handle or an EXITED target is ignored.
    pub fn cancel(&self, cpu: &mut Cpu, target: ThreadId, result: ExitValue) {
        if cpu.current_thread() == Some(target) {
            self.exit(cpu, result);
        }

        let mut threads = self.threads.lock();
        let Some(thread) = threads.get_mut(target) else {
            log::debug!("kthread: cancel of stale handle {} ignored", target);
            return;
        };

        if thread.state().is_exited() {
            log::debug!("kthread: cancel of exited {} ignored", target);
            return;
        }

        thread.request_cancel(result);
        self.scheduler.cancel(thread);

        log::debug!(
            "kthread: cancel requested for {} ({:?}) with {:#x}",
            target,
            thread.state(),
            result
        );
    }
}
