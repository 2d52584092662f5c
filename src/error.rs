// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel thread errors
//!
//! Two classes of failure exist:
//!
//! - **Allocation failure**: stack pages or thread-object storage ran out.
//!   Reported to the caller of `create`/`clone` as [`KthreadError`].
//! - **Invariant violation**: a collaborator broke a lifecycle rule
//!   (destroying a live thread, cloning a sleeper, an exit handoff that
//!   returned). These halt through [`kassert!`](crate::kassert); there is no
//!   recovery path.

use core::fmt;

use thiserror::Error;

/// Prefix of every fatal invariant message
pub const INVARIANT_PREFIX: &str = "kthread invariant violated";

/// Resource that ran out during an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Page-granular memory for a kernel stack
    KernelStack,
    /// Fixed-size storage for a thread object
    ThreadObject,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelStack => f.write_str("kernel stack"),
            Self::ThreadObject => f.write_str("thread object"),
        }
    }
}

/// Recoverable kernel thread error
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KthreadError {
    /// Stack or object storage exhausted; nothing was left reachable
    #[error("allocation failure: out of {0} memory")]
    AllocationFailure(Resource),
}

impl KthreadError {
    /// Which resource was exhausted
    pub const fn resource(&self) -> Resource {
        match self {
            Self::AllocationFailure(resource) => *resource,
        }
    }
}

/// Result type for kernel thread operations
pub type Result<T> = core::result::Result<T, KthreadError>;

/// Halt the kernel on a broken lifecycle invariant
#[cold]
#[track_caller]
pub fn invariant_violation(args: fmt::Arguments<'_>) -> ! {
    log::error!("{}: {}", INVARIANT_PREFIX, args);
    panic!("{}: {}", INVARIANT_PREFIX, args);
}

/// Kernel assertion
///
/// Checks a lifecycle invariant and halts with a formatted message when it
/// does not hold. Unlike `debug_assert!`, the check stays in release builds.
#[macro_export]
macro_rules! kassert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::error::invariant_violation(format_args!($($arg)+));
        }
    };
}
