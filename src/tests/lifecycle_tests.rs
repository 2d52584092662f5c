// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Create, exit and destroy

use x86_64::PhysAddr;

use crate::error::{KthreadError, Resource};
use crate::process::ProcessState;
use crate::sched::{SchedLink, SchedulerHooks, ThreadState};
use crate::testing::{worker, Fixture, Handoff, PAGE_DIRECTORY, STACK_SIZE};

#[test]
fn test_create_links_thread_into_process() {
    let fx = Fixture::new();
    let tid = fx.spawn();

    assert!(fx.process.contains_thread(tid));
    assert_eq!(fx.process.thread_count(), 1);

    fx.manager
        .with_thread(tid, |thread| {
            assert_eq!(thread.state(), ThreadState::Runnable);
            assert!(!thread.cancel_requested());
            assert_eq!(thread.pending_result(), None);
            assert_eq!(thread.wait_channel(), None);
            assert_eq!(thread.errno(), 0);
            assert_eq!(thread.process_id(), Some(fx.process.pid()));
            assert!(thread.is_process_member());

            assert_eq!(thread.stack().size(), STACK_SIZE);
            let ctx = thread.context();
            assert_eq!(ctx.rip, worker as usize as u64);
            assert_eq!(ctx.rdi, 1);
            assert_eq!(ctx.rsi, 2);
            assert_eq!(ctx.page_directory, PhysAddr::new(PAGE_DIRECTORY));
            assert_eq!(ctx.kstack, thread.stack().bottom());
        })
        .unwrap();
}

#[test]
fn test_create_queues_without_running() {
    let fx = Fixture::new();
    let tid = fx.spawn();

    assert!(fx.cpu.is_idle());
    assert_eq!(fx.manager.with_thread(tid, |t| t.sched_link()), Some(SchedLink::RunQueue));
    assert_eq!(fx.scheduler().run_queue_len(), 1);
    fx.check_invariants();
}

#[test]
#[should_panic(expected = "in state Dead")]
fn test_create_in_dead_process_is_fatal() {
    let fx = Fixture::new();
    fx.process.set_state(ProcessState::Dead);
    fx.spawn();
}

#[test]
#[should_panic(expected = "in state Exiting")]
fn test_create_in_exiting_process_is_fatal() {
    let fx = Fixture::new();
    fx.process.set_state(ProcessState::Exiting);
    fx.spawn();
}

#[test]
fn test_exit_hands_off_and_never_returns() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);

    let handoff = fx.exit_current(99);
    assert_eq!(
        handoff,
        Handoff {
            cpu: 0,
            thread: tid,
            result: 99
        }
    );
    assert_eq!(fx.manager.process_layer().exited(), vec![handoff]);

    fx.manager
        .with_thread(tid, |thread| {
            assert_eq!(thread.state(), ThreadState::Exited);
            assert_eq!(thread.pending_result(), Some(99));
            assert_eq!(thread.sched_link(), SchedLink::Unlinked);
        })
        .unwrap();
    fx.check_invariants();

    // Reaping is left to the process layer
    assert!(fx.process.contains_thread(tid));
}

#[test]
fn test_create_fails_when_stacks_exhausted() {
    let fx = Fixture::with_limits(1, 4);
    let first = fx.spawn();

    let result = fx.manager.create(&fx.process, worker, 0, 0);
    assert_eq!(
        result,
        Err(KthreadError::AllocationFailure(Resource::KernelStack))
    );

    assert_eq!(fx.process.threads(), vec![first]);
    assert_eq!(fx.manager.thread_count(), 1);
    assert_eq!(fx.pool.count(), 1);
    assert_eq!(fx.scheduler().run_queue_len(), 1);
}

#[test]
fn test_create_fails_when_slots_exhausted() {
    let fx = Fixture::with_limits(4, 1);
    fx.spawn();
    let available = fx.pages.available_pages();

    let result = fx.manager.create(&fx.process, worker, 0, 0);
    assert_eq!(
        result,
        Err(KthreadError::AllocationFailure(Resource::ThreadObject))
    );

    assert_eq!(fx.pages.available_pages(), available);
    assert_eq!(fx.process.thread_count(), 1);
}

#[test]
fn test_stacks_are_pairwise_disjoint() {
    let fx = Fixture::new();
    let mut ids: Vec<_> = (0..6).map(|_| fx.spawn()).collect();
    ids.push(fx.manager.clone_thread(ids[0]).unwrap());
    ids.push(fx.manager.clone_thread(ids[3]).unwrap());

    fx.manager.with_threads(|threads| {
        let stacks: Vec<_> = ids
            .iter()
            .map(|&id| threads.get(id).unwrap().stack())
            .collect();

        for (i, a) in stacks.iter().enumerate() {
            for b in &stacks[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    });
}

#[test]
fn test_destroy_releases_everything() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);
    fx.exit_current(0);

    fx.manager.destroy(tid);

    assert!(!fx.manager.contains(tid));
    assert_eq!(fx.manager.state(tid), None);
    assert!(!fx.process.contains_thread(tid));
    assert_eq!(fx.pages.available_pages(), fx.pages.total_pages());
    assert_eq!(fx.pages.extent_count(), 0);
    assert_eq!(fx.pool.count(), 0);
}

#[test]
fn test_destroy_after_process_dropped_membership() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);
    fx.exit_current(0);

    assert!(fx.process.remove_thread(tid));
    fx.manager.destroy(tid);

    assert_eq!(fx.process.thread_count(), 0);
    assert_eq!(fx.pool.count(), 0);
}

#[test]
fn test_slot_reuse_leaves_old_handle_stale() {
    let mut fx = Fixture::with_limits(1, 1);
    let old = fx.spawn();
    fx.run(old);
    fx.exit_current(0);
    fx.manager.destroy(old);

    let new = fx.spawn();
    assert_eq!(new.slot(), old.slot());
    assert_ne!(new, old);
    assert_eq!(fx.manager.state(old), None);
    assert_eq!(fx.manager.state(new), Some(ThreadState::Runnable));
}

#[test]
fn test_exited_thread_stays_exited() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);
    fx.exit_current(5);

    // Nothing is runnable and cancellation is ignored
    assert_eq!(fx.run_next(), None);
    fx.cancel(tid, 6);

    fx.manager
        .with_thread(tid, |thread| {
            assert_eq!(thread.state(), ThreadState::Exited);
            assert_eq!(thread.pending_result(), Some(5));
            assert!(!thread.cancel_requested());
        })
        .unwrap();
}

#[test]
#[should_panic(expected = "made runnable from Exited")]
fn test_requeueing_exited_thread_is_fatal() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);
    fx.exit_current(0);

    fx.manager
        .with_thread(tid, |thread| fx.scheduler().make_runnable(thread));
}

#[test]
#[should_panic(expected = "destroy of stale thread handle")]
fn test_double_destroy_is_fatal() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);
    fx.exit_current(0);

    fx.manager.destroy(tid);
    fx.manager.destroy(tid);
}

#[test]
#[should_panic(expected = "in state Runnable")]
fn test_destroy_of_live_thread_is_fatal() {
    let fx = Fixture::new();
    let tid = fx.spawn();
    fx.manager.destroy(tid);
}

#[test]
#[should_panic(expected = "exit on cpu0 with no current thread")]
fn test_exit_without_current_thread_is_fatal() {
    let mut fx = Fixture::new();
    fx.manager.exit(&mut fx.cpu, 0);
}

#[test]
#[should_panic(expected = "exiting while linked to RunQueue")]
fn test_exit_of_queued_thread_is_fatal() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.cpu.set_current(tid, Some(fx.process.pid()));
    fx.manager.exit(&mut fx.cpu, 0);
}

#[test]
#[should_panic(expected = "exiting while cpu0 runs process")]
fn test_exit_from_foreign_process_is_fatal() {
    let mut fx = Fixture::new();
    let tid = fx.spawn();
    fx.run(tid);

    let other = Fixture::running_process();
    fx.cpu.set_current(tid, Some(other.pid()));
    fx.manager.exit(&mut fx.cpu, 0);
}
