// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread state and scheduling linkage
//!
//! Defines the thread states, the scheduling link a thread occupies, the
//! wait channel identifier and the thread bookkeeping flags.

use core::fmt;

use bitflags::bitflags;

/// Thread states
///
/// ```text
/// Runnable <-> Sleeping
///    |  ^----- SleepingCancellable
///    v
///  Exited
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Thread is running or waiting on a run queue
    Runnable = 0,
    /// Thread is blocked and only a natural wakeup ends the sleep
    Sleeping = 1,
    /// Thread is blocked and cancellation may end the sleep early
    SleepingCancellable = 2,
    /// Thread has terminated and been handed to the process layer
    Exited = 3,
}

impl ThreadState {
    /// Check if the thread is blocked on a wait channel
    pub const fn is_sleeping(self) -> bool {
        matches!(self, Self::Sleeping | Self::SleepingCancellable)
    }

    /// Check if the thread has terminated
    pub const fn is_exited(self) -> bool {
        matches!(self, Self::Exited)
    }
}

/// Wait channel identifier
///
/// Names the wait queue a sleeping thread is blocked on. The queue itself
/// belongs to the scheduler; threads only keep this non-owning identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitChannel(u64);

impl WaitChannel {
    /// Create a channel identifier
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WaitChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wchan{}", self.0)
    }
}

/// Scheduling structure a thread is linked into
///
/// A thread occupies at most one of these at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedLink {
    /// Not linked anywhere (exited, or a clone awaiting setup)
    Unlinked,
    /// Waiting on the run queue
    RunQueue,
    /// Currently executing on the given execution unit
    OnCpu(u32),
    /// Blocked on a wait queue
    WaitQueue(WaitChannel),
}

impl SchedLink {
    /// Check if the link is populated
    pub const fn is_linked(self) -> bool {
        !matches!(self, Self::Unlinked)
    }

    /// Wait channel, if the link is a wait queue
    pub const fn wait_channel(self) -> Option<WaitChannel> {
        match self {
            Self::WaitQueue(channel) => Some(channel),
            _ => None,
        }
    }
}

bitflags! {
    /// Thread bookkeeping flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u32 {
        /// Another thread asked this one to terminate
        const CANCEL_REQUESTED = 1 << 0;
        /// Produced by clone and not yet attached to a process
        const CLONED = 1 << 1;
    }
}
