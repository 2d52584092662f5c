// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread cloning
//!
//! The thread half of fork. A clone gets its own stack and an empty
//! context and inherits the source's pending result, cancel request and
//! errno. It belongs to no process and sits on no queue until the fork
//! path loads its context and calls [`KthreadManager::attach`].

use super::context::ExecutionContext;
use super::kthread::KthreadManager;
use super::scheduler::SchedulerHooks;
use super::state::{ThreadFlags, ThreadState};
use super::thread::{Thread, ThreadId};
use crate::error::{invariant_violation, Result};
use crate::kassert;
use crate::mm::{ObjectPool, PageAllocator};
use crate::process::ProcessLayer;

impl<A, O, S, L> KthreadManager<A, O, S, L>
where
    A: PageAllocator,
    O: ObjectPool,
    S: SchedulerHooks,
    L: ProcessLayer,
{
    /// Clone the RUNNABLE thread `source`
    ///
    /// On failure nothing is left allocated and `source` is untouched.
    pub fn clone_thread(&self, source: ThreadId) -> Result<ThreadId> {
        let (pending_result, cancel_requested, errno) = {
            let threads = self.threads.lock();
            let Some(thread) = threads.get(source) else {
                invariant_violation(format_args!("clone of stale thread handle {}", source));
            };

            kassert!(
                thread.state() == ThreadState::Runnable,
                "clone of {} in state {:?}",
                source,
                thread.state()
            );

            (thread.pending_result(), thread.cancel_requested(), thread.errno())
        };

        let (id, stack) = self.allocate()?;
        let context = ExecutionContext::empty(&stack);
        let mut clone = Thread::new(id, stack, context);

        let mut flags = ThreadFlags::CLONED;
        flags.set(ThreadFlags::CANCEL_REQUESTED, cancel_requested);
        clone.set_flags(flags);
        clone.set_pending_result(pending_result);
        clone.set_errno(errno);

        self.threads.lock().insert(clone);

        log::debug!("kthread: cloned {} from {}", id, source);
        Ok(id)
    }
}
