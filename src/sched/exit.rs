// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread exit
//!
//! The only path by which a thread becomes EXITED. The exiting thread
//! records its result, leaves its CPU and hands itself to the process
//! layer, which never resumes it.

use super::cpu::Cpu;
use super::kthread::KthreadManager;
use super::scheduler::SchedulerHooks;
use super::state::SchedLink;
use super::thread::ExitValue;
use crate::error::invariant_violation;
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
    /// Terminate the thread current on `cpu` with `result`
    ///
    /// The thread must be running, not blocked on any wait channel, and
    /// belong to the process current on `cpu`. Does not return.
    pub fn exit(&self, cpu: &mut Cpu, result: ExitValue) -> ! {
        let Some(id) = cpu.current_thread() else {
            invariant_violation(format_args!("exit on cpu{} with no current thread", cpu.id()));
        };

        let mut threads = self.threads.lock();
        let Some(thread) = threads.get_mut(id) else {
            invariant_violation(format_args!("exit of stale thread {} on cpu{}", id, cpu.id()));
        };

        kassert!(
            thread.wait_channel().is_none(),
            "{} exiting while blocked on {:?}",
            id,
            thread.wait_channel()
        );
        kassert!(
            thread.sched_link() == SchedLink::OnCpu(cpu.id()),
            "{} exiting while linked to {:?}",
            id,
            thread.sched_link()
        );
        kassert!(
            thread.process_id() == cpu.current_process(),
            "{} of process {:?} exiting while cpu{} runs process {:?}",
            id,
            thread.process_id(),
            cpu.id(),
            cpu.current_process()
        );

        thread.mark_exited(result);
        drop(threads);

        log::debug!("kthread: {} exited with {:#x}", id, result);
        self.process_layer.thread_exited(cpu, id, result)
    }
}
